use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::models::{JobPosting, json_kind};

/// Read a JSON array of records. A missing file or anything but an array is
/// an error; the records themselves are not checked here.
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse JSON in {}", path.display()))?;

    match value {
        Value::Array(records) => Ok(records),
        other => Err(anyhow!(
            "{} must contain a JSON array, found {}",
            path.display(),
            json_kind(&other)
        )),
    }
}

/// Job postings from a scraper dump. Records without a company or title are
/// skipped with a warning.
pub fn load_job_postings(path: &Path) -> Result<Vec<JobPosting>> {
    let records = load_records(path)?;
    let total = records.len();

    let jobs: Vec<JobPosting> = records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| match JobPosting::from_value(record) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping invalid job posting");
                None
            }
        })
        .collect();

    info!(path = %path.display(), loaded = jobs.len(), skipped = total - jobs.len(), "loaded job postings");
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_job_postings_skips_malformed_records() {
        let file = file_with(
            r#"[
                {"company_name": "Acme Corp", "job_title": "Engineer", "source": "Indeed"},
                {"company_name": "", "job_title": "Blank company"},
                "not an object",
                {"job_title": "No company"},
                {"company_name": "Globex", "job_title": "Analyst", "job_location": "NYC"}
            ]"#,
        );

        let jobs = load_job_postings(file.path()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].company_name, "Acme Corp");
        assert_eq!(jobs[0].job_description, "");
        assert_eq!(jobs[1].job_location, "NYC");
    }

    #[test]
    fn test_non_array_file_is_an_error() {
        let file = file_with(r#"{"jobs": []}"#);
        let err = load_records(file.path()).unwrap_err();
        assert!(err.to_string().contains("must contain a JSON array, found an object"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_records(Path::new("/nonexistent/job_posts.json")).is_err());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let file = file_with("[{\"company_name\": ");
        let err = load_records(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
