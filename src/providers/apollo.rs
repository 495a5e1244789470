use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::http::JsonClient;
use super::{APOLLO, ContactLookup, RoleFilter, settle};
use crate::error::LookupError;
use crate::models::ContactCandidate;
use crate::retry::RetryPolicy;

pub const APOLLO_API_URL: &str = "https://api.apollo.io";

const VERIFIED_CONFIDENCE: i64 = 100;
const UNVERIFIED_CONFIDENCE: i64 = 70;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    people: Vec<SearchPerson>,
}

#[derive(Debug, Deserialize)]
struct SearchPerson {
    id: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatchResponse {
    person: Option<EnrichedPerson>,
}

#[derive(Debug, Deserialize)]
struct EnrichedPerson {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_status: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    #[serde(default)]
    primary_domain: Option<String>,
}

/// Apollo.io people search followed by per-person enrichment.
///
/// Search results carry no email, so every eligible hit costs a second
/// `people/match` call. The first enriched person with an email wins.
#[derive(Debug)]
pub struct ApolloClient {
    api_key: String,
    base_url: String,
    search_limit: u32,
    http: JsonClient,
    retry: RetryPolicy,
}

impl ApolloClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, LookupError> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            search_limit: 5,
            http: JsonClient::new(APOLLO, timeout)?,
            retry,
        })
    }

    pub fn with_search_limit(mut self, limit: u32) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    fn search_people(&self, company: &str, roles: &RoleFilter) -> Result<Vec<SearchPerson>, LookupError> {
        let url = format!("{}/v1/mixed_people/search", self.base_url);
        let payload = json!({
            "q_organization_name": company,
            "person_titles": roles.roles(),
            "page": 1,
            "per_page": self.search_limit,
        });
        let body = self.retry.run("apollo people search", |_| {
            self.http.send(
                self.http
                    .post(&url)
                    .header("X-Api-Key", &self.api_key)
                    .header("Cache-Control", "no-cache")
                    .json(&payload),
            )
        })?;
        let response: SearchResponse = self.http.decode(body)?;
        Ok(response.people)
    }

    fn enrich(&self, person_id: &str) -> Result<Option<EnrichedPerson>, LookupError> {
        let url = format!("{}/v1/people/match", self.base_url);
        let payload = json!({ "id": person_id, "reveal_personal_emails": false });
        let body = self.retry.run("apollo enrichment", |_| {
            self.http.send(
                self.http
                    .post(&url)
                    .header("X-Api-Key", &self.api_key)
                    .header("Cache-Control", "no-cache")
                    .json(&payload),
            )
        })?;
        let response: MatchResponse = self.http.decode(body)?;
        Ok(response.person)
    }

    fn find(
        &self,
        company: &str,
        job_title: &str,
        roles: &RoleFilter,
    ) -> Result<Option<ContactCandidate>, LookupError> {
        let people = self.search_people(company, roles)?;
        debug!(company, hits = people.len(), "apollo people search");

        for person in people {
            if !roles.allows(person.title.as_deref().unwrap_or_default()) {
                continue;
            }

            let enriched = match self.enrich(&person.id) {
                Ok(Some(enriched)) => enriched,
                Ok(None) => continue,
                Err(e) => {
                    warn!(company, person_id = %person.id, error = %e, "apollo enrichment failed");
                    continue;
                }
            };

            let position = enriched
                .title
                .clone()
                .or(person.title.clone())
                .unwrap_or_else(|| job_title.to_string());
            if !roles.allows(&position) {
                continue;
            }

            let Some(email) = enriched.email.as_deref().filter(|e| !e.trim().is_empty()) else {
                continue;
            };

            let confidence = match enriched.email_status.as_deref() {
                Some("verified") => VERIFIED_CONFIDENCE,
                _ => UNVERIFIED_CONFIDENCE,
            };
            let domain = enriched
                .organization
                .as_ref()
                .and_then(|o| o.primary_domain.as_deref())
                .unwrap_or_default();

            return Ok(Some(
                ContactCandidate::found(email, confidence, APOLLO)
                    .with_position(&position)
                    .with_domain(domain)
                    .with_name(
                        enriched.first_name.as_deref().unwrap_or_default(),
                        enriched.last_name.as_deref().unwrap_or_default(),
                    ),
            ));
        }

        Ok(None)
    }
}

impl ContactLookup for ApolloClient {
    fn name(&self) -> &str {
        APOLLO
    }

    fn lookup(&self, company: &str, job_title: &str, roles: &RoleFilter) -> ContactCandidate {
        settle(APOLLO, company, job_title, self.find(company, job_title, roles))
    }
}
