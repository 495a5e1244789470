use thiserror::Error;

/// Failure inside a single provider call. Never crosses `ContactLookup::lookup`.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Network error, timeout, rate limit or upstream 5xx. Worth retrying.
    #[error("{provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// Response had an unexpected shape. Retrying will not help.
    #[error("{provider} returned a malformed response: {reason}")]
    Malformed { provider: String, reason: String },
}

impl LookupError {
    pub fn unavailable(provider: &str, reason: impl ToString) -> Self {
        LookupError::Unavailable {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(provider: &str, reason: impl ToString) -> Self {
        LookupError::Malformed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LookupError::Unavailable { .. })
    }
}

/// Failure while scoring a job against prospects.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("scorer unavailable: {0}")]
    Unavailable(String),

    #[error("unparsable scorer response: {0}")]
    Malformed(String),
}

/// A scraped record that does not have the shape the engine needs.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing or empty required field '{0}'")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(LookupError::unavailable("Hunter.io", "timeout").is_retryable());
        assert!(!LookupError::malformed("Hunter.io", "missing data").is_retryable());
    }

    #[test]
    fn test_lookup_error_messages_name_the_provider() {
        let err = LookupError::malformed("Apollo.io", "no people array");
        assert_eq!(
            err.to_string(),
            "Apollo.io returned a malformed response: no people array"
        );
    }
}
