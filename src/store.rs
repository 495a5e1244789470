use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};

use crate::models::{ContactResult, JobPosting, Match, ResolvedContact};

/// Local record of postings, resolved contacts and matches.
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

/// A persisted match, flattened for display.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub company_name: String,
    pub job_title: String,
    pub prospect_name: Option<String>,
    pub prospect_title: Option<String>,
    pub score: u8,
    pub created_at: String,
}

impl Store {
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_path())
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_path() -> PathBuf {
        match directories::ProjectDirs::from("", "", "leadscout") {
            Some(dirs) => dirs.data_dir().join("leadscout.db"),
            None => PathBuf::from("leadscout.db"),
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_postings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_name TEXT NOT NULL,
                job_title TEXT NOT NULL,
                job_location TEXT NOT NULL DEFAULT '',
                job_description TEXT NOT NULL DEFAULT '',
                job_post_date TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                UNIQUE (company_name, job_title)
            );

            CREATE TABLE IF NOT EXISTS company_contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                email TEXT,
                position TEXT NOT NULL DEFAULT '',
                confidence_score INTEGER NOT NULL DEFAULT 0 CHECK (confidence_score BETWEEN 0 AND 100),
                domain TEXT NOT NULL DEFAULT '',
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_name TEXT NOT NULL,
                job_title TEXT NOT NULL,
                prospect_name TEXT,
                prospect_title TEXT,
                prospect_company TEXT,
                score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_matches_job ON matches(company_name, job_title);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='company_contacts'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'leadscout init' first."));
        }
        Ok(())
    }

    // --- Job postings ---

    pub fn save_job_posting(&self, job: &JobPosting) -> Result<()> {
        self.conn.execute(
            "INSERT INTO job_postings
                (company_name, job_title, job_location, job_description, job_post_date, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (company_name, job_title) DO UPDATE SET
                job_location = excluded.job_location,
                job_description = excluded.job_description,
                job_post_date = excluded.job_post_date,
                source = excluded.source",
            params![
                job.company_name,
                job.job_title,
                job.job_location,
                job.job_description,
                job.job_post_date,
                job.source,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_job_postings(&self) -> Result<Vec<JobPosting>> {
        let mut stmt = self.conn.prepare(
            "SELECT company_name, job_title, job_location, job_description, job_post_date, source
             FROM job_postings ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(JobPosting {
                company_name: row.get(0)?,
                job_title: row.get(1)?,
                job_location: row.get(2)?,
                job_description: row.get(3)?,
                job_post_date: row.get(4)?,
                source: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list job postings")
    }

    // --- Contacts ---

    /// One row per company. A later result replaces an earlier one only if it
    /// is at least as confident, so a rerun that finds nothing keeps the old
    /// contact.
    pub fn save_contact(&self, result: &ContactResult) -> Result<()> {
        let c = &result.contact_info;
        self.conn.execute(
            "INSERT INTO company_contacts
                (company_name, email, position, confidence_score, domain, first_name, last_name, source, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (company_name) DO UPDATE SET
                email = excluded.email,
                position = excluded.position,
                confidence_score = excluded.confidence_score,
                domain = excluded.domain,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                source = excluded.source,
                updated_at = excluded.updated_at
             WHERE excluded.confidence_score >= company_contacts.confidence_score",
            params![
                result.company_name,
                c.email,
                c.position,
                c.confidence_score,
                c.domain,
                c.first_name,
                c.last_name,
                c.source,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_contacts(&self) -> Result<Vec<ContactResult>> {
        let mut stmt = self.conn.prepare(
            "SELECT company_name, email, position, confidence_score, domain, first_name, last_name, source
             FROM company_contacts ORDER BY company_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ContactResult {
                company_name: row.get(0)?,
                contact_info: ResolvedContact {
                    email: row.get(1)?,
                    position: row.get(2)?,
                    confidence_score: row.get(3)?,
                    domain: row.get(4)?,
                    first_name: row.get(5)?,
                    last_name: row.get(6)?,
                    source: row.get(7)?,
                },
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list contacts")
    }

    // --- Matches ---

    pub fn save_match(&self, m: &Match) -> Result<()> {
        let prospect = m.prospect.as_ref();
        self.conn.execute(
            "INSERT INTO matches
                (company_name, job_title, prospect_name, prospect_title, prospect_company, score, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                m.job.company_name,
                m.job.job_title,
                prospect.map(|p| &p.name),
                prospect.map(|p| &p.title),
                prospect.map(|p| &p.company),
                m.score,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_matches(&self) -> Result<Vec<MatchRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT company_name, job_title, prospect_name, prospect_title, score, created_at
             FROM matches ORDER BY score DESC, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MatchRow {
                company_name: row.get(0)?,
                job_title: row.get(1)?,
                prospect_name: row.get(2)?,
                prospect_title: row.get(3)?,
                score: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list matches")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Prospect;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("nested").join("leadscout.db")).unwrap();
        store.init().unwrap();
        (dir, store)
    }

    fn job(company: &str, title: &str) -> JobPosting {
        JobPosting {
            company_name: company.into(),
            job_title: title.into(),
            job_location: "Remote".into(),
            job_description: "desc".into(),
            job_post_date: "2024-05-01".into(),
            source: "Indeed".into(),
        }
    }

    fn contact(company: &str, email: Option<&str>, confidence: u8) -> ContactResult {
        let mut info = ResolvedContact::not_found("Recruiter");
        if let Some(email) = email {
            info.email = Some(email.into());
            info.confidence_score = confidence;
            info.source = "Hunter.io".into();
        }
        ContactResult {
            company_name: company.into(),
            contact_info: info,
        }
    }

    #[test]
    fn test_uninitialized_store_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("fresh.db")).unwrap();
        let err = store.ensure_initialized().unwrap_err();
        assert!(err.to_string().contains("leadscout init"));

        store.init().unwrap();
        store.ensure_initialized().unwrap();
        store.init().unwrap();
    }

    #[test]
    fn test_job_postings_upsert_by_company_and_title() {
        let (_dir, store) = store();
        store.save_job_posting(&job("Acme", "Engineer")).unwrap();
        let mut updated = job("Acme", "Engineer");
        updated.job_location = "Berlin".into();
        store.save_job_posting(&updated).unwrap();
        store.save_job_posting(&job("Acme", "Designer")).unwrap();

        let jobs = store.list_job_postings().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0], updated);
    }

    #[test]
    fn test_contact_round_trip_and_case_insensitive_company() {
        let (_dir, store) = store();
        store.save_contact(&contact("Acme", Some("hr@acme.com"), 90)).unwrap();
        store.save_contact(&contact("Globex", None, 0)).unwrap();

        let contacts = store.list_contacts().unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0], contact("Acme", Some("hr@acme.com"), 90));
        assert!(contacts[1].contact_info.email.is_none());
        assert_eq!(contacts[1].contact_info.source, "Multiple sources");

        store.save_contact(&contact("ACME", Some("talent@acme.com"), 95)).unwrap();
        let contacts = store.list_contacts().unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].contact_info.email.as_deref(), Some("talent@acme.com"));
    }

    #[test]
    fn test_weaker_contact_does_not_overwrite() {
        let (_dir, store) = store();
        store.save_contact(&contact("Acme", Some("hr@acme.com"), 90)).unwrap();
        store.save_contact(&contact("Acme", None, 0)).unwrap();

        let contacts = store.list_contacts().unwrap();
        assert_eq!(contacts[0].contact_info.email.as_deref(), Some("hr@acme.com"));
    }

    #[test]
    fn test_matches_with_and_without_prospect() {
        let (_dir, store) = store();
        let prospect = Prospect {
            name: "Ada".into(),
            title: "Engineer".into(),
            company: "Initech".into(),
            location: String::new(),
            profile_link: String::new(),
        };
        store
            .save_match(&Match {
                job: job("Acme", "Engineer"),
                prospect: Some(prospect),
                score: 87,
            })
            .unwrap();
        store.save_match(&Match::unmatched(&job("Globex", "Analyst"))).unwrap();

        let rows = store.list_matches().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].prospect_name.as_deref(), Some("Ada"));
        assert_eq!(rows[0].score, 87);
        assert!(rows[1].prospect_name.is_none());
        assert_eq!(rows[1].score, 0);
        assert!(!rows[1].created_at.is_empty());
    }
}
