use std::collections::HashMap;
use std::sync::Mutex;

/// Identity of one scoring request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub job_title: String,
    pub company_name: String,
    /// Mode plus whatever else shapes the prompt (e.g. the prospect for per-pair).
    pub discriminator: String,
}

impl CacheKey {
    pub fn new(job_title: &str, company_name: &str, discriminator: impl Into<String>) -> Self {
        Self {
            job_title: job_title.to_string(),
            company_name: company_name.to_string(),
            discriminator: discriminator.into(),
        }
    }
}

/// Write-once store of raw LLM responses for the lifetime of a run.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<CacheKey, String>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    /// Cached value, or the result of `fetch`. Only `Ok` values are stored,
    /// and an existing entry is never replaced.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &CacheKey,
        fetch: impl FnOnce() -> Result<String, E>,
    ) -> Result<String, E> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        // The lock is not held across `fetch`; a concurrent writer that got
        // there first keeps its value.
        let value = fetch()?;
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Ok(entries.entry(key.clone()).or_insert(value).clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn key(discriminator: &str) -> CacheKey {
        CacheKey::new("Backend Engineer", "Acme Corp", discriminator)
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = ResponseCache::new();
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>("87".to_string())
        };

        assert_eq!(cache.get_or_try_insert_with(&key("pair:X"), fetch).unwrap(), "87");
        assert_eq!(cache.get_or_try_insert_with(&key("pair:X"), fetch).unwrap(), "87");
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.get(&key("pair:X")).as_deref(), Some("87"));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = ResponseCache::new();
        let err = cache.get_or_try_insert_with(&key("batch"), || Err::<String, _>("timeout"));
        assert_eq!(err, Err("timeout"));
        assert!(cache.is_empty());

        let ok = cache.get_or_try_insert_with(&key("batch"), || Ok::<_, &str>("{}".to_string()));
        assert_eq!(ok, Ok("{}".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_first_value_wins() {
        let cache = ResponseCache::new();
        cache.get_or_try_insert_with(&key("pair:X"), || Ok::<_, ()>("10".into())).unwrap();
        let second = cache
            .get_or_try_insert_with(&key("pair:X"), || Ok::<_, ()>("99".into()))
            .unwrap();
        assert_eq!(second, "10");
    }

    #[test]
    fn test_key_fields_are_all_significant() {
        let cache = ResponseCache::new();
        cache.get_or_try_insert_with(&key("pair:X"), || Ok::<_, ()>("1".into())).unwrap();

        assert!(cache.get(&key("pair:Y")).is_none());
        assert!(cache.get(&CacheKey::new("Backend Engineer", "Globex", "pair:X")).is_none());
        assert!(cache.get(&CacheKey::new("Data Engineer", "Acme Corp", "pair:X")).is_none());
    }
}
