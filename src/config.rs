use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::matching::MatchMode;
use crate::providers::RoleFilter;
use crate::providers::apollo::APOLLO_API_URL;
use crate::providers::hunter::HUNTER_API_URL;
use crate::retry::RetryPolicy;

/// Everything a run needs besides its input files. Every field has a default,
/// so an empty or missing config file is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersSection,
    pub retry: RetrySection,
    pub hunter: HunterSection,
    pub apollo: ApolloSection,
    pub linkedin: LinkedInSection,
    pub matching: MatchingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    /// Query and tie-break order.
    pub order: Vec<String>,
    pub allowed_titles: Vec<String>,
    /// Minimum gap between two provider calls, shared by all workers.
    pub throttle_secs: f64,
    pub timeout_secs: u64,
    pub workers: usize,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            order: vec!["hunter".into(), "apollo".into(), "linkedin".into()],
            allowed_titles: vec![
                "HR".into(),
                "Recruiter".into(),
                "Talent Acquisition".into(),
                "Human Resources".into(),
            ],
            throttle_secs: 1.0,
            timeout_secs: 30,
            workers: 1,
        }
    }
}

impl ProvidersSection {
    pub fn roles(&self) -> RoleFilter {
        RoleFilter::new(&self.allowed_titles)
    }

    pub fn throttle(&self) -> Duration {
        Duration::try_from_secs_f64(self.throttle_secs).unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_secs: 4,
            max_backoff_secs: 10,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HunterSection {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for HunterSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: HUNTER_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApolloSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub search_limit: u32,
}

impl Default for ApolloSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: APOLLO_API_URL.to_string(),
            search_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkedInSection {
    /// JSON export of a Sales Navigator search.
    pub roster: Option<PathBuf>,
    pub min_company_similarity: f64,
}

impl Default for LinkedInSection {
    fn default() -> Self {
        Self {
            roster: None,
            min_company_similarity: 0.92,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingSection {
    pub model: String,
    pub mode: MatchMode,
}

impl Default for MatchingSection {
    fn default() -> Self {
        Self {
            model: "claude-sonnet".to_string(),
            mode: MatchMode::PerPair,
        }
    }
}

impl Config {
    /// Load `path`, or the default config file if there is one, then apply
    /// `.env` and environment overrides. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML")
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "leadscout").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// API keys from the environment win over the file.
    pub fn apply_env(&mut self) {
        if let Some(key) = non_empty_env("HUNTER_API_KEY") {
            self.hunter.api_key = Some(key);
        }
        if let Some(key) = non_empty_env("APOLLO_API_KEY") {
            self.apollo.api_key = Some(key);
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
