use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::models::{ContactCandidate, ContactResult, JobPosting, ResolvedContact};
use crate::normalize;
use crate::providers::{ProviderRegistry, RoleFilter};
use crate::resolver::ConfidenceResolver;
use crate::retry::Throttle;

/// Runs every job through name variations, providers and the resolver.
pub struct ResolutionPipeline {
    registry: ProviderRegistry,
    resolver: ConfidenceResolver,
    roles: RoleFilter,
    throttle: Throttle,
    workers: usize,
}

impl ResolutionPipeline {
    pub fn new(registry: ProviderRegistry, roles: RoleFilter) -> Self {
        let resolver = ConfidenceResolver::new(registry.priority());
        Self {
            registry,
            resolver,
            roles,
            throttle: Throttle::new(Duration::from_secs(1)),
            workers: 1,
        }
    }

    /// Minimum gap between any two provider calls, across all workers.
    pub fn with_throttle(mut self, min_interval: Duration) -> Self {
        self.throttle = Throttle::new(min_interval);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// One result per job, in input order. Never fails.
    pub fn resolve_all(&self, jobs: &[JobPosting]) -> Vec<ContactResult> {
        info!(jobs = jobs.len(), providers = self.registry.len(), workers = self.workers, "resolving contacts");

        let results = if self.workers <= 1 || jobs.len() <= 1 {
            jobs.iter().map(|job| self.resolve_isolated(job)).collect()
        } else {
            self.resolve_parallel(jobs)
        };

        let found = results.iter().filter(|r| r.contact_info.is_found()).count();
        info!(found, total = results.len(), "contact resolution finished");
        results
    }

    fn resolve_parallel(&self, jobs: &[JobPosting]) -> Vec<ContactResult> {
        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<ContactResult>>> = Mutex::new(vec![None; jobs.len()]);

        thread::scope(|scope| {
            for _ in 0..self.workers.min(jobs.len()) {
                scope.spawn(|| {
                    loop {
                        let idx = next.fetch_add(1, Ordering::SeqCst);
                        let Some(job) = jobs.get(idx) else { break };
                        let result = self.resolve_isolated(job);
                        slots.lock().unwrap_or_else(|p| p.into_inner())[idx] = Some(result);
                    }
                });
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(|p| p.into_inner())
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| slot.unwrap_or_else(|| not_found_result(job)))
            .collect()
    }

    /// Resolve one job; anything that blows up stays inside this job.
    fn resolve_isolated(&self, job: &JobPosting) -> ContactResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.resolve_job(job))) {
            Ok(contact) => ContactResult {
                company_name: job.company_name.clone(),
                contact_info: contact,
            },
            Err(payload) => {
                error!(
                    company = %job.company_name,
                    job_title = %job.job_title,
                    panic_message = %panic_message(payload.as_ref()),
                    "contact resolution failed; continuing with next job"
                );
                not_found_result(job)
            }
        }
    }

    /// Try each name variation in order and stop at the first one where any
    /// provider produced an email. A spelling already tried is not queried
    /// again.
    pub fn resolve_job(&self, job: &JobPosting) -> ResolvedContact {
        let variations = normalize::variations(&job.company_name);
        for (level, company) in variations.iter().enumerate() {
            if variations[..level].contains(company) {
                debug!(company = %job.company_name, variation = %company, level, "variation already tried");
                continue;
            }
            let candidates = self.query_providers(company, &job.job_title);
            if candidates.iter().any(ContactCandidate::has_email) {
                let contact = self.resolver.resolve(&candidates, &job.job_title);
                info!(
                    company = %job.company_name,
                    variation = %company,
                    level,
                    source = %contact.source,
                    confidence = contact.confidence_score,
                    "contact found"
                );
                return contact;
            }
            debug!(company = %job.company_name, variation = %company, level, "no contact at this variation");
        }

        info!(company = %job.company_name, "no contact found in any source");
        ResolvedContact::not_found(&job.job_title)
    }

    fn query_providers(&self, company: &str, job_title: &str) -> Vec<ContactCandidate> {
        self.registry
            .iter()
            .map(|provider| {
                self.throttle.wait();
                provider.lookup(company, job_title, &self.roles)
            })
            .collect()
    }
}

/// Collapse results to one per company (case-insensitive), keeping the
/// highest-confidence contact and the order companies first appeared in.
pub fn dedup_by_company(results: &[ContactResult]) -> Vec<ContactResult> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<ContactResult> = Vec::new();

    for result in results {
        let key = result.company_name.trim().to_lowercase();
        match index.get(&key) {
            Some(&i) => {
                if result.contact_info.confidence_score > merged[i].contact_info.confidence_score {
                    merged[i] = result.clone();
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(result.clone());
            }
        }
    }

    merged
}

fn not_found_result(job: &JobPosting) -> ContactResult {
    ContactResult {
        company_name: job.company_name.clone(),
        contact_info: ResolvedContact::not_found(&job.job_title),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic payload not string".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{APOLLO, ContactLookup, HUNTER, LINKEDIN};

    type Script = dyn Fn(&str) -> Option<(&'static str, i64)> + Send + Sync;

    /// Provider whose answer depends only on the queried company string.
    struct Scripted {
        name: &'static str,
        script: Box<Script>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            script: impl Fn(&str) -> Option<(&'static str, i64)> + Send + Sync + 'static,
        ) -> Self {
            Self {
                name,
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn never(name: &'static str) -> Self {
            Self::new(name, |_| None)
        }
    }

    impl ContactLookup for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn lookup(&self, company: &str, job_title: &str, _roles: &RoleFilter) -> ContactCandidate {
            self.calls.lock().unwrap().push(company.to_string());
            match (self.script)(company) {
                Some((email, confidence)) => ContactCandidate::found(email, confidence, self.name),
                None => ContactCandidate::empty(job_title, self.name),
            }
        }
    }

    /// Lets a test keep a handle on a provider after the registry owns it.
    struct Shared(std::sync::Arc<Scripted>);

    impl ContactLookup for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn lookup(&self, company: &str, job_title: &str, roles: &RoleFilter) -> ContactCandidate {
            self.0.lookup(company, job_title, roles)
        }
    }

    fn job(company: &str) -> JobPosting {
        JobPosting {
            company_name: company.to_string(),
            job_title: "Backend Engineer".to_string(),
            job_location: "Remote".to_string(),
            job_description: String::new(),
            job_post_date: String::new(),
            source: "Indeed".to_string(),
        }
    }

    fn pipeline(registry: ProviderRegistry) -> ResolutionPipeline {
        ResolutionPipeline::new(registry, RoleFilter::default()).with_throttle(Duration::ZERO)
    }

    #[test]
    fn test_scenario_apollo_fills_hunter_gap() {
        let registry = ProviderRegistry::new()
            .register(Scripted::never(HUNTER))
            .register(Scripted::new(APOLLO, |c| (c == "Acme Corp").then_some(("j@acme.com", 100))))
            .register(Scripted::never(LINKEDIN));

        let results = pipeline(registry).resolve_all(&[job("Acme Corp")]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].company_name, "Acme Corp");
        assert_eq!(results[0].contact_info.email.as_deref(), Some("j@acme.com"));
        assert_eq!(results[0].contact_info.source, "Apollo.io");
        assert_eq!(results[0].contact_info.confidence_score, 100);
    }

    #[test]
    fn test_scenario_nothing_anywhere_is_sentinel() {
        let hunter = std::sync::Arc::new(Scripted::never(HUNTER));
        let registry = ProviderRegistry::new()
            .register(Shared(hunter.clone()))
            .register(Scripted::never(APOLLO))
            .register(Scripted::never(LINKEDIN));

        let results = pipeline(registry).resolve_all(&[job("Globex")]);
        let contact = &results[0].contact_info;
        assert!(contact.email.is_none());
        assert_eq!(contact.confidence_score, 0);
        assert_eq!(contact.source, "Multiple sources");
        assert_eq!(*hunter.calls.lock().unwrap(), vec!["Globex"]);
    }

    #[test]
    fn test_distinct_variations_are_all_tried() {
        let hunter = std::sync::Arc::new(Scripted::never(HUNTER));
        let registry = ProviderRegistry::new().register(Shared(hunter.clone()));

        let contact = pipeline(registry).resolve_job(&job("Acme Corp"));
        assert!(!contact.is_found());
        assert_eq!(*hunter.calls.lock().unwrap(), vec!["Acme Corp", "AcmeCorp", "Acme"]);
    }

    #[test]
    fn test_variation_loop_short_circuits() {
        let hunter = std::sync::Arc::new(Scripted::new(HUNTER, |c| {
            (c == "AcmeCorp").then_some(("hr@acme.com", 90))
        }));
        let registry = ProviderRegistry::new().register(Shared(hunter.clone()));

        let contact = pipeline(registry).resolve_job(&job("Acme Corp"));
        assert_eq!(contact.email.as_deref(), Some("hr@acme.com"));
        assert_eq!(*hunter.calls.lock().unwrap(), vec!["Acme Corp", "AcmeCorp"]);
    }

    #[test]
    fn test_all_providers_queried_within_winning_variation() {
        let apollo = std::sync::Arc::new(Scripted::never(APOLLO));
        let registry = ProviderRegistry::new()
            .register(Scripted::new(HUNTER, |_| Some(("h@acme.com", 70))))
            .register(Shared(apollo.clone()));

        pipeline(registry).resolve_job(&job("Acme Corp"));
        assert_eq!(*apollo.calls.lock().unwrap(), vec!["Acme Corp"]);
    }

    #[test]
    fn test_tie_break_prefers_registered_priority() {
        let registry = ProviderRegistry::new()
            .register(Scripted::new(HUNTER, |_| Some(("h@acme.com", 80))))
            .register(Scripted::new(APOLLO, |_| Some(("a@acme.com", 80))));

        let contact = pipeline(registry).resolve_job(&job("Acme Corp"));
        assert_eq!(contact.source, HUNTER);
    }

    #[test]
    fn test_failing_job_is_isolated() {
        let registry = ProviderRegistry::new().register(Scripted::new(HUNTER, |c| {
            if c.starts_with("Broken") {
                panic!("provider exploded");
            }
            Some(("hr@ok.com", 90))
        }));

        let jobs = [job("Alpha Inc"), job("Broken Co"), job("Gamma LLC")];
        let results = pipeline(registry).resolve_all(&jobs);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].contact_info.email.as_deref(), Some("hr@ok.com"));
        assert_eq!(results[1].company_name, "Broken Co");
        assert!(results[1].contact_info.email.is_none());
        assert_eq!(results[1].contact_info.source, "Multiple sources");
        assert_eq!(results[2].contact_info.email.as_deref(), Some("hr@ok.com"));
    }

    #[test]
    fn test_parallel_workers_keep_input_order() {
        let registry = ProviderRegistry::new().register(Scripted::new(HUNTER, |c| match c {
            "Alpha" => Some(("a@alpha.com", 60)),
            "Gamma" => Some(("g@gamma.com", 70)),
            _ => None,
        }));

        let jobs: Vec<_> = ["Alpha", "Beta", "Gamma", "Delta", "Alpha"]
            .into_iter()
            .map(job)
            .collect();
        let results = pipeline(registry).with_workers(3).resolve_all(&jobs);

        let companies: Vec<_> = results.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(companies, vec!["Alpha", "Beta", "Gamma", "Delta", "Alpha"]);
        assert_eq!(results[0].contact_info.email.as_deref(), Some("a@alpha.com"));
        assert!(results[1].contact_info.email.is_none());
        assert_eq!(results[2].contact_info.email.as_deref(), Some("g@gamma.com"));
        assert_eq!(results[4].contact_info.email.as_deref(), Some("a@alpha.com"));
    }

    #[test]
    fn test_parallel_workers_isolate_failures() {
        let registry = ProviderRegistry::new().register(Scripted::new(HUNTER, |c| {
            if c == "Broken" {
                panic!("boom");
            }
            Some(("hr@x.com", 50))
        }));

        let jobs: Vec<_> = ["One", "Broken", "Three"].into_iter().map(job).collect();
        let results = pipeline(registry).with_workers(2).resolve_all(&jobs);
        assert_eq!(results.len(), 3);
        assert!(results[0].contact_info.is_found());
        assert!(!results[1].contact_info.is_found());
        assert!(results[2].contact_info.is_found());
    }

    #[test]
    fn test_empty_registry_yields_sentinels() {
        let results = pipeline(ProviderRegistry::new()).resolve_all(&[job("Acme"), job("Globex")]);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.contact_info.is_found()));
    }

    #[test]
    fn test_dedup_by_company_keeps_best_contact() {
        let mut weak = ResolvedContact::not_found("Recruiter");
        weak.email = Some("l@acme.com".into());
        weak.confidence_score = 50;
        let mut strong = weak.clone();
        strong.email = Some("h@acme.com".into());
        strong.confidence_score = 92;

        let results = vec![
            ContactResult { company_name: "Acme".into(), contact_info: weak },
            ContactResult { company_name: "Globex".into(), contact_info: ResolvedContact::not_found("HR") },
            ContactResult { company_name: "ACME ".into(), contact_info: strong },
        ];

        let merged = dedup_by_company(&results);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].contact_info.email.as_deref(), Some("h@acme.com"));
        assert_eq!(merged[1].company_name, "Globex");
    }

    #[test]
    fn test_panic_message_extraction() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        let other: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(other.as_ref()), "panic payload not string");
    }
}
