use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::ai::LanguageModel;
use crate::cache::{CacheKey, ResponseCache};
use crate::error::ScoreError;
use crate::models::{JobPosting, Match, Prospect};

const PAIR_MAX_TOKENS: u32 = 100;
const BATCH_MAX_TOKENS_PER_PROSPECT: u32 = 30;
const BATCH_MAX_TOKENS_CAP: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum MatchMode {
    /// One request per prospect, bare integer answers.
    #[default]
    #[serde(rename = "pair")]
    #[value(name = "pair")]
    PerPair,
    /// One request per job, JSON object of name -> score.
    #[serde(rename = "batch")]
    #[value(name = "batch")]
    Batch,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::PerPair => write!(f, "pair"),
            MatchMode::Batch => write!(f, "batch"),
        }
    }
}

/// Scores each job against the prospect list and keeps the best one.
pub struct MatchingEngine {
    model: Box<dyn LanguageModel>,
    mode: MatchMode,
    cache: ResponseCache,
}

impl MatchingEngine {
    pub fn new(model: Box<dyn LanguageModel>, mode: MatchMode) -> Self {
        Self {
            model,
            mode,
            cache: ResponseCache::new(),
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn match_all(&self, jobs: &[JobPosting], records: &[Value]) -> Vec<Match> {
        let prospects = admit_prospects(records);
        info!(
            jobs = jobs.len(),
            prospects = prospects.len(),
            mode = %self.mode,
            model = self.model.model_name(),
            "matching jobs to prospects"
        );

        let matches: Vec<Match> = jobs.iter().map(|job| self.match_prospects(job, &prospects)).collect();
        let matched = matches.iter().filter(|m| m.is_matched()).count();
        info!(matched, total = matches.len(), "matching finished");
        matches
    }

    /// Best prospect for `job` among the well-formed `records`.
    pub fn match_job(&self, job: &JobPosting, records: &[Value]) -> Match {
        self.match_prospects(job, &admit_prospects(records))
    }

    pub fn match_prospects(&self, job: &JobPosting, prospects: &[Prospect]) -> Match {
        let result = match self.mode {
            MatchMode::PerPair => self.match_per_pair(job, prospects),
            MatchMode::Batch => self.match_batch(job, prospects),
        };

        match &result.prospect {
            Some(p) => info!(
                job_title = %job.job_title,
                company = %job.company_name,
                prospect = %p.name,
                score = result.score,
                "matched"
            ),
            None => info!(job_title = %job.job_title, company = %job.company_name, "no match"),
        }
        result
    }

    fn match_per_pair(&self, job: &JobPosting, prospects: &[Prospect]) -> Match {
        let mut best: Option<(&Prospect, u8)> = None;

        for prospect in prospects {
            let key = CacheKey::new(
                &job.job_title,
                &job.company_name,
                format!("pair:{}|{}", prospect.name, prospect.company),
            );
            let score = self
                .ask(&key, &pair_prompt(job, prospect), PAIR_MAX_TOKENS)
                .and_then(|text| parse_pair_score(&text));

            let score = match score {
                Ok(score) => score,
                Err(e) => {
                    warn!(job_title = %job.job_title, prospect = %prospect.name, error = %e, "invalid score");
                    continue;
                }
            };
            debug!(job_title = %job.job_title, prospect = %prospect.name, score, "scored pair");

            if score > best.map_or(0, |(_, s)| s) {
                best = Some((prospect, score));
            }
        }

        finish(job, best)
    }

    fn match_batch(&self, job: &JobPosting, prospects: &[Prospect]) -> Match {
        if prospects.is_empty() {
            return Match::unmatched(job);
        }

        let names: Vec<&str> = prospects.iter().map(|p| p.name.as_str()).collect();
        let key = CacheKey::new(&job.job_title, &job.company_name, format!("batch:{}", names.join("|")));
        let max_tokens = (BATCH_MAX_TOKENS_PER_PROSPECT * prospects.len() as u32 + PAIR_MAX_TOKENS)
            .min(BATCH_MAX_TOKENS_CAP);

        let scores = self
            .ask(&key, &batch_prompt(job, prospects), max_tokens)
            .and_then(|text| parse_batch_scores(&text, prospects));

        let scores = match scores {
            Ok(scores) => scores,
            Err(e) => {
                warn!(job_title = %job.job_title, prospects = prospects.len(), error = %e, "batch scoring failed");
                return Match::unmatched(job);
            }
        };

        let mut best: Option<(&Prospect, u8)> = None;
        for (prospect, score) in prospects.iter().zip(scores) {
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((prospect, score));
            }
        }
        finish(job, best)
    }

    fn ask(&self, key: &CacheKey, prompt: &str, max_tokens: u32) -> Result<String, ScoreError> {
        self.cache.get_or_try_insert_with(key, || {
            self.model
                .complete(prompt, max_tokens)
                .map_err(|e| ScoreError::Unavailable(format!("{e:#}")))
        })
    }
}

fn finish(job: &JobPosting, best: Option<(&Prospect, u8)>) -> Match {
    match best {
        Some((prospect, score)) if score > 0 => Match {
            job: job.clone(),
            prospect: Some(prospect.clone()),
            score,
        },
        _ => Match::unmatched(job),
    }
}

/// Keep only records that are well-formed prospects.
pub fn admit_prospects(records: &[Value]) -> Vec<Prospect> {
    records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| match Prospect::from_value(record) {
            Ok(prospect) => Some(prospect),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping invalid prospect record");
                None
            }
        })
        .collect()
}

fn pair_prompt(job: &JobPosting, prospect: &Prospect) -> String {
    format!(
        "Evaluate how well the following job posting matches with the prospect's profile:\n\n\
         Job Posting:\n\
         Title: {}\n\
         Company: {}\n\
         Description: {}\n\n\
         Prospect:\n\
         Name: {}\n\
         Title: {}\n\
         Company: {}\n\n\
         Provide a match score between 0 and 100, where 100 is a perfect match.\n\
         Only respond with the numeric score.",
        job.job_title, job.company_name, job.job_description, prospect.name, prospect.title, prospect.company,
    )
}

fn batch_prompt(job: &JobPosting, prospects: &[Prospect]) -> String {
    let mut listing = String::new();
    for (i, p) in prospects.iter().enumerate() {
        listing.push_str(&format!(
            "{}. Name: {} | Title: {} | Company: {}\n",
            i + 1,
            p.name,
            p.title,
            p.company
        ));
    }

    format!(
        "Evaluate how well the following job posting matches with each prospect's profile.\n\n\
         Job Posting:\n\
         Title: {}\n\
         Company: {}\n\
         Description: {}\n\n\
         Prospects:\n{}\n\
         For every prospect give a match score between 0 and 100, where 100 is a perfect match.\n\
         Respond ONLY with a JSON object mapping each prospect's exact name to an integer score, \
         e.g. {{\"Jane Doe\": 72}}. No other text.",
        job.job_title, job.company_name, job.job_description, listing,
    )
}

/// A bare integer in 0..=100, surrounding whitespace allowed.
pub fn parse_pair_score(text: &str) -> Result<u8, ScoreError> {
    let digits = text.trim();
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScoreError::Malformed(format!("not a bare integer: {:?}", snippet(text))));
    }

    match digits.parse::<u8>() {
        Ok(score) if score <= 100 => Ok(score),
        _ => Err(ScoreError::Malformed(format!("score out of range: {}", digits))),
    }
}

/// One score per prospect, in prospect order. Every prospect must be present
/// with an integer in 0..=100; otherwise the whole response is rejected.
pub fn parse_batch_scores(text: &str, prospects: &[Prospect]) -> Result<Vec<u8>, ScoreError> {
    let body = strip_json_fences(text);
    let scores: Map<String, Value> = serde_json::from_str(body)
        .map_err(|e| ScoreError::Malformed(format!("expected a JSON object: {e}")))?;

    prospects
        .iter()
        .map(|p| {
            let value = scores
                .get(&p.name)
                .ok_or_else(|| ScoreError::Malformed(format!("no score for '{}'", p.name)))?;
            match value.as_u64() {
                Some(score) if score <= 100 => Ok(score as u8),
                _ => Err(ScoreError::Malformed(format!("invalid score for '{}': {}", p.name, value))),
            }
        })
        .collect()
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text.strip_prefix("```json").or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped.strip_suffix("```").map(str::trim).unwrap_or(stripped)
        }
        None => text,
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(80).collect()
}
