use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::models::StoredCoverLetter;

/// Local cover-letter store, keyed by job key.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Self { conn, path: path.to_path_buf() };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cover_letters (
                job_key TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn set_cover_letter(&self, job_key: &str, text: &str) -> Result<()> {
        if job_key.trim().is_empty() {
            return Err(anyhow!("Job key must not be empty"));
        }
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO cover_letters (job_key, text, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(job_key) DO UPDATE SET text = excluded.text, updated_at = excluded.updated_at",
            params![job_key, text, now],
        )?;
        Ok(())
    }

    pub fn get_cover_letter(&self, job_key: &str) -> Result<Option<StoredCoverLetter>> {
        let result = self.conn.query_row(
            "SELECT job_key, text, updated_at FROM cover_letters WHERE job_key = ?1",
            [job_key],
            Self::row_to_cover_letter,
        );
        match result {
            Ok(letter) => Ok(Some(letter)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_cover_letters(&self) -> Result<Vec<StoredCoverLetter>> {
        let mut stmt = self
            .conn
            .prepare("SELECT job_key, text, updated_at FROM cover_letters ORDER BY job_key")?;
        let rows = stmt.query_map([], Self::row_to_cover_letter)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list cover letters")
    }

    fn row_to_cover_letter(row: &rusqlite::Row) -> rusqlite::Result<StoredCoverLetter> {
        Ok(StoredCoverLetter {
            job_key: row.get(0)?,
            text: row.get(1)?,
            updated_at: row.get(2)?,
        })
    }
}
