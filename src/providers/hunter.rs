use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::http::JsonClient;
use super::{ContactLookup, HUNTER, RoleFilter, settle};
use crate::error::LookupError;
use crate::models::ContactCandidate;
use crate::retry::RetryPolicy;

pub const HUNTER_API_URL: &str = "https://api.hunter.io";

#[derive(Debug, Deserialize)]
struct DomainSearchResponse {
    data: DomainSearchData,
}

#[derive(Debug, Deserialize)]
struct DomainSearchData {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    emails: Vec<HunterEmail>,
}

#[derive(Debug, Deserialize)]
struct HunterEmail {
    value: String,
    #[serde(default)]
    confidence: Option<i64>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

/// Hunter.io domain search: one request per company, Hunter's own confidence.
#[derive(Debug)]
pub struct HunterClient {
    api_key: String,
    base_url: String,
    http: JsonClient,
    retry: RetryPolicy,
}

impl HunterClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, LookupError> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: JsonClient::new(HUNTER, timeout)?,
            retry,
        })
    }

    fn search(
        &self,
        company: &str,
        job_title: &str,
        roles: &RoleFilter,
    ) -> Result<Option<ContactCandidate>, LookupError> {
        let url = format!("{}/v2/domain-search", self.base_url);
        let body = self.retry.run("hunter domain-search", |_| {
            self.http.send(
                self.http
                    .get(&url)
                    .query(&[("company", company), ("api_key", self.api_key.as_str())]),
            )
        })?;
        let response: DomainSearchResponse = self.http.decode(body)?;
        let domain = response.data.domain.unwrap_or_default();

        debug!(company, emails = response.data.emails.len(), "hunter domain search");

        // Hunter leaves position blank for generic inboxes; the job title
        // stands in so the role filter still has something to judge.
        let hit = response.data.emails.into_iter().find(|email| {
            let position = email.position.as_deref().unwrap_or(job_title);
            roles.allows(position)
        });

        Ok(hit.map(|email| {
            let position = email.position.unwrap_or_else(|| job_title.to_string());
            ContactCandidate::found(&email.value, email.confidence.unwrap_or(0), HUNTER)
                .with_position(&position)
                .with_domain(&domain)
                .with_name(
                    email.first_name.as_deref().unwrap_or_default(),
                    email.last_name.as_deref().unwrap_or_default(),
                )
        }))
    }
}

impl ContactLookup for HunterClient {
    fn name(&self) -> &str {
        HUNTER
    }

    fn lookup(&self, company: &str, job_title: &str, roles: &RoleFilter) -> ContactCandidate {
        settle(HUNTER, company, job_title, self.search(company, job_title, roles))
    }
}
