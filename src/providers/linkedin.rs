use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use strsim::jaro_winkler;
use tracing::{debug, warn};

use super::{ContactLookup, LINKEDIN, RoleFilter, settle};
use crate::models::ContactCandidate;

/// LinkedIn data carries no verification signal, so it ranks below both APIs.
const ROSTER_CONFIDENCE: i64 = 50;

/// One person exported from a Sales Navigator search.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Contacts derived from the LinkedIn Sales Navigator export.
///
/// Company names in the export are whatever LinkedIn displays, so they are
/// compared by Jaro-Winkler similarity rather than exact equality.
#[derive(Debug)]
pub struct LinkedInDerivedClient {
    roster: Vec<RosterEntry>,
    min_similarity: f64,
}

impl LinkedInDerivedClient {
    pub fn new(roster: Vec<RosterEntry>) -> Self {
        Self {
            roster,
            min_similarity: 0.92,
        }
    }

    /// Load a roster export. Entries without a name or company are skipped
    /// with a warning; only an unreadable file or a non-array fails.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read LinkedIn roster: {}", path.display()))?;
        let records: Vec<Value> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse LinkedIn roster: {}", path.display()))?;

        let total = records.len();
        let roster: Vec<RosterEntry> = records
            .into_iter()
            .enumerate()
            .filter_map(|(idx, record)| match serde_json::from_value::<RosterEntry>(record) {
                Ok(entry) if !entry.name.trim().is_empty() && !entry.company.trim().is_empty() => Some(entry),
                Ok(_) => {
                    warn!(index = idx, "skipping roster entry without name or company");
                    None
                }
                Err(e) => {
                    warn!(index = idx, error = %e, "skipping invalid roster entry");
                    None
                }
            })
            .collect();

        debug!(
            entries = roster.len(),
            skipped = total - roster.len(),
            path = %path.display(),
            "loaded LinkedIn roster"
        );
        Ok(Self::new(roster))
    }

    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = min_similarity.clamp(0.0, 1.0);
        self
    }

    fn same_company(&self, query: &str, listed: &str) -> bool {
        let query = query.trim().to_lowercase();
        let listed = listed.trim().to_lowercase();
        if query.is_empty() || listed.is_empty() {
            return false;
        }
        query == listed || jaro_winkler(&query, &listed) >= self.min_similarity
    }

    fn find(&self, company: &str, roles: &RoleFilter) -> Option<ContactCandidate> {
        let entry = self.roster.iter().find(|entry| {
            self.same_company(company, &entry.company)
                && roles.allows(&entry.title)
                && entry.email.as_deref().is_some_and(|e| !e.trim().is_empty())
        })?;

        let email = entry.email.as_deref().unwrap_or_default();
        let domain = email.split_once('@').map(|(_, d)| d).unwrap_or_default();
        let (first_name, last_name) = split_name(&entry.name);

        Some(
            ContactCandidate::found(email, ROSTER_CONFIDENCE, LINKEDIN)
                .with_position(&entry.title)
                .with_domain(domain)
                .with_name(first_name, last_name),
        )
    }
}

impl ContactLookup for LinkedInDerivedClient {
    fn name(&self) -> &str {
        LINKEDIN
    }

    fn lookup(&self, company: &str, job_title: &str, roles: &RoleFilter) -> ContactCandidate {
        settle(LINKEDIN, company, job_title, Ok(self.find(company, roles)))
    }
}

fn split_name(full: &str) -> (&str, &str) {
    let full = full.trim();
    match full.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (full, ""),
    }
}
