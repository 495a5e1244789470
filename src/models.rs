use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::InputError;

/// Source label used when no provider produced an email.
pub const MULTIPLE_SOURCES: &str = "Multiple sources";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub company_name: String,
    pub job_title: String,
    #[serde(default)]
    pub job_location: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub job_post_date: String,
    #[serde(default)]
    pub source: String, // "Indeed", "LinkedIn", ...
}

impl JobPosting {
    /// Build a posting from a scraped record, rejecting anything without a
    /// company and a title.
    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        let obj = as_object(value)?;
        Ok(Self {
            company_name: required_str(obj, "company_name")?,
            job_title: required_str(obj, "job_title")?,
            job_location: optional_str(obj, "job_location"),
            job_description: optional_str(obj, "job_description"),
            job_post_date: optional_str(obj, "job_post_date"),
            source: optional_str(obj, "source"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub name: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub profile_link: String,
}

impl Prospect {
    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        let obj = as_object(value)?;
        Ok(Self {
            name: required_str(obj, "name")?,
            title: required_str(obj, "title")?,
            company: required_str(obj, "company")?,
            location: optional_str(obj, "location"),
            profile_link: optional_str(obj, "profile_link"),
        })
    }
}

/// One answer from one provider for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactCandidate {
    pub email: Option<String>,
    pub position: String,
    pub confidence_score: u8,
    pub domain: String,
    pub first_name: String,
    pub last_name: String,
    pub source: String,
}

impl ContactCandidate {
    /// The "nothing usable" answer. Errors and misses both end up here.
    pub fn empty(job_title: &str, source: &str) -> Self {
        Self {
            email: None,
            position: job_title.to_string(),
            confidence_score: 0,
            domain: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            source: source.to_string(),
        }
    }

    /// A hit. Blank or "Not found" emails collapse to a miss, and a real email
    /// never carries a zero confidence.
    pub fn found(email: &str, confidence: i64, source: &str) -> Self {
        let email = normalize_email(email);
        let confidence_score = match email {
            Some(_) => confidence.clamp(1, 100) as u8,
            None => 0,
        };
        Self {
            email,
            position: String::new(),
            confidence_score,
            domain: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            source: source.to_string(),
        }
    }

    pub fn with_position(mut self, position: &str) -> Self {
        self.position = position.to_string();
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    pub fn with_name(mut self, first_name: &str, last_name: &str) -> Self {
        self.first_name = first_name.to_string();
        self.last_name = last_name.to_string();
        self
    }

    pub fn has_email(&self) -> bool {
        self.email.is_some()
    }
}

/// The single contact chosen for a company, or the not-found sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContact {
    pub email: Option<String>,
    pub position: String,
    pub confidence_score: u8,
    pub domain: String,
    pub first_name: String,
    pub last_name: String,
    pub source: String,
}

impl ResolvedContact {
    pub fn not_found(job_title: &str) -> Self {
        Self {
            email: None,
            position: job_title.to_string(),
            confidence_score: 0,
            domain: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            source: MULTIPLE_SOURCES.to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.email.is_some()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl From<ContactCandidate> for ResolvedContact {
    fn from(c: ContactCandidate) -> Self {
        Self {
            email: c.email,
            position: c.position,
            confidence_score: c.confidence_score,
            domain: c.domain,
            first_name: c.first_name,
            last_name: c.last_name,
            source: c.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactResult {
    pub company_name: String,
    pub contact_info: ResolvedContact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub job: JobPosting,
    pub prospect: Option<Prospect>,
    pub score: u8,
}

impl Match {
    pub fn unmatched(job: &JobPosting) -> Self {
        Self {
            job: job.clone(),
            prospect: None,
            score: 0,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.prospect.is_some()
    }
}

fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("not found") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, InputError> {
    value.as_object().ok_or(InputError::NotAnObject(json_kind(value)))
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, InputError> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(InputError::MissingField(field))
}

fn optional_str(obj: &Map<String, Value>, field: &str) -> String {
    obj.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
