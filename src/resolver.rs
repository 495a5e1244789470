use std::cmp::Reverse;

use crate::models::{ContactCandidate, ResolvedContact};

/// Picks the single best contact out of every provider's answer.
///
/// Highest confidence wins. Equal confidence falls back to the fixed
/// provider ranking given at construction, so the outcome never depends on
/// the order answers arrived in. Sources missing from the ranking come last.
#[derive(Debug, Clone)]
pub struct ConfidenceResolver {
    priority: Vec<String>,
}

impl ConfidenceResolver {
    pub fn new(priority: Vec<String>) -> Self {
        Self { priority }
    }

    fn rank(&self, source: &str) -> usize {
        self.priority
            .iter()
            .position(|p| p == source)
            .unwrap_or(self.priority.len())
    }

    pub fn resolve(&self, candidates: &[ContactCandidate], job_title: &str) -> ResolvedContact {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.has_email())
            .min_by_key(|(idx, c)| (Reverse(c.confidence_score), self.rank(&c.source), *idx))
            .map(|(_, c)| ResolvedContact::from(c.clone()))
            .unwrap_or_else(|| ResolvedContact::not_found(job_title))
    }
}
