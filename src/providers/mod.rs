//! Contact-discovery providers behind one lookup contract.
//!
//! Registration order is priority order: it drives both the query order in
//! the pipeline and the tie-break in the resolver.

pub mod apollo;
pub mod http;
pub mod hunter;
pub mod linkedin;

use std::time::Duration;

use anyhow::{Result, bail};
use regex::Regex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::LookupError;
use crate::models::ContactCandidate;

pub use apollo::ApolloClient;
pub use hunter::HunterClient;
pub use linkedin::LinkedInDerivedClient;

pub const HUNTER: &str = "Hunter.io";
pub const APOLLO: &str = "Apollo.io";
pub const LINKEDIN: &str = "LinkedIn Sales Navigator";

pub trait ContactLookup: Send + Sync {
    /// Provider name, copied into every candidate's `source`.
    fn name(&self) -> &str;

    /// Best eligible contact at `company`. Never fails: errors and misses
    /// both come back as `ContactCandidate::empty`.
    fn lookup(&self, company: &str, job_title: &str, roles: &RoleFilter) -> ContactCandidate;
}

/// Fold a provider's internal result into the always-a-candidate contract.
pub(crate) fn settle(
    provider: &str,
    company: &str,
    job_title: &str,
    result: Result<Option<ContactCandidate>, LookupError>,
) -> ContactCandidate {
    match result {
        Ok(Some(candidate)) if candidate.has_email() => candidate,
        Ok(_) => ContactCandidate::empty(job_title, provider),
        Err(e) => {
            warn!(provider, company, error = %e, "lookup failed");
            ContactCandidate::empty(job_title, provider)
        }
    }
}

/// Case-insensitive allow-list of roles ("HR", "Recruiter", ...). A role
/// matches only as whole words, so "HR" accepts "HR Business Partner" but
/// not "Threat Analyst".
#[derive(Debug, Clone)]
pub struct RoleFilter {
    roles: Vec<String>,
    patterns: Vec<Regex>,
}

impl RoleFilter {
    pub fn new<S: AsRef<str>>(roles: &[S]) -> Self {
        let roles: Vec<String> = roles
            .iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        let patterns = roles
            .iter()
            .filter_map(|role| match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(role))) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(role = %role, error = %e, "ignoring unusable role");
                    None
                }
            })
            .collect();
        Self { roles, patterns }
    }

    /// An empty allow-list accepts any position.
    pub fn allows(&self, position: &str) -> bool {
        self.roles.is_empty() || self.patterns.iter().any(|re| re.is_match(position))
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl Default for RoleFilter {
    fn default() -> Self {
        Self::new(&["HR", "Recruiter", "Talent Acquisition", "Human Resources"])
    }
}

/// Providers in priority order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn ContactLookup>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, provider: impl ContactLookup + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ContactLookup> {
        self.providers.iter().map(|p| p.as_ref())
    }

    /// Provider names, highest priority first.
    pub fn priority(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Build the registry named by `[providers] order`. Providers without
    /// credentials or data are skipped with a warning.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.providers.timeout_secs);
        let retry = config.retry.policy();
        let mut registry = Self::new();

        for name in &config.providers.order {
            match name.to_lowercase().as_str() {
                "hunter" => match &config.hunter.api_key {
                    Some(key) => {
                        let client = HunterClient::new(key, &config.hunter.base_url, timeout, retry.clone())?;
                        registry = registry.register(client);
                    }
                    None => warn!("HUNTER_API_KEY not set, skipping Hunter.io"),
                },
                "apollo" => match &config.apollo.api_key {
                    Some(key) => {
                        let client = ApolloClient::new(key, &config.apollo.base_url, timeout, retry.clone())?
                            .with_search_limit(config.apollo.search_limit);
                        registry = registry.register(client);
                    }
                    None => warn!("APOLLO_API_KEY not set, skipping Apollo.io"),
                },
                "linkedin" => match &config.linkedin.roster {
                    Some(path) => match LinkedInDerivedClient::from_file(path) {
                        Ok(client) => {
                            registry = registry
                                .register(client.with_min_similarity(config.linkedin.min_company_similarity));
                        }
                        Err(e) => warn!(error = %e, "LinkedIn roster unavailable, skipping"),
                    },
                    None => warn!("no LinkedIn roster configured, skipping"),
                },
                other => bail!("Unknown provider '{}'. Available: hunter, apollo, linkedin", other),
            }
        }

        info!(providers = ?registry.priority(), "provider registry ready");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, Option<&'static str>);

    impl ContactLookup for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn lookup(&self, _company: &str, job_title: &str, _roles: &RoleFilter) -> ContactCandidate {
            match self.1 {
                Some(email) => ContactCandidate::found(email, 80, self.0),
                None => ContactCandidate::empty(job_title, self.0),
            }
        }
    }

    #[test]
    fn test_role_filter_matches_whole_words_case_insensitively() {
        let roles = RoleFilter::new(&["HR", "Recruiter", "Talent Acquisition"]);
        assert!(roles.allows("Senior Technical Recruiter"));
        assert!(roles.allows("hr business partner"));
        assert!(roles.allows("Head of HR"));
        assert!(roles.allows("Head of TALENT ACQUISITION"));
        assert!(!roles.allows("Software Engineer"));
    }

    #[test]
    fn test_default_roles_ignore_letters_inside_words() {
        let roles = RoleFilter::default();
        assert!(roles.allows("HR Business Partner"));
        assert!(!roles.allows("Threat Intelligence Analyst"));
        assert!(!roles.allows("Chrome Platform Engineer"));
        assert!(!roles.allows("Three.js Developer"));
    }

    #[test]
    fn test_role_filter_keeps_configured_spelling() {
        let roles = RoleFilter::new(&[" Talent Acquisition ", "C++ Recruiter"]);
        assert_eq!(roles.roles(), ["Talent Acquisition", "C++ Recruiter"]);
        assert!(roles.allows("Senior c++ recruiter"));
    }

    #[test]
    fn test_empty_role_filter_allows_everything() {
        let roles = RoleFilter::new::<&str>(&[]);
        assert!(roles.allows("Software Engineer"));

        let blank = RoleFilter::new(&["  "]);
        assert!(blank.roles().is_empty());
    }

    #[test]
    fn test_registry_preserves_registration_order() {
        let registry = ProviderRegistry::new()
            .register(Fixed(HUNTER, None))
            .register(Fixed(APOLLO, Some("a@b.com")))
            .register(Fixed(LINKEDIN, None));
        assert_eq!(registry.priority(), vec![HUNTER, APOLLO, LINKEDIN]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_settle_turns_errors_into_empty_candidates() {
        let c = settle(
            HUNTER,
            "Acme",
            "Recruiter",
            Err(LookupError::unavailable(HUNTER, "timeout")),
        );
        assert!(c.email.is_none());
        assert_eq!(c.source, HUNTER);
        assert_eq!(c.position, "Recruiter");
    }

    #[test]
    fn test_registry_from_config_skips_providers_without_keys() {
        let mut config = Config::default();
        config.hunter.api_key = None;
        config.apollo.api_key = Some("apollo-key".to_string());
        config.linkedin.roster = None;

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.priority(), vec![APOLLO]);
    }

    #[test]
    fn test_registry_from_config_rejects_unknown_provider() {
        let mut config = Config::default();
        config.providers.order = vec!["clearbit".to_string()];
        assert!(ProviderRegistry::from_config(&config).is_err());
    }
}
