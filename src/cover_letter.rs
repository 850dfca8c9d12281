use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::db::Database;
use crate::models::CoverLetter;

/// Supplies the stored cover letter for a job key.
pub trait CoverLetterSource: Send + Sync {
    fn fetch(&self, job_key: &str) -> impl Future<Output = Result<Option<CoverLetter>>> + Send;
}

/// Fetches a letter, treating any failure as "no cover letter available".
pub async fn fetch_or_absent<S: CoverLetterSource>(source: &S, job_key: &str) -> Option<CoverLetter> {
    match source.fetch(job_key).await {
        Ok(letter) => letter,
        Err(e) => {
            warn!("Cover letter fetch failed for '{}': {:#}", job_key, e);
            None
        }
    }
}

// --- HTTP source ---

const COVER_LETTER_PATH: &str = "/cover-letter";

#[derive(Debug, Clone)]
pub struct HttpCoverLetters {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCoverLetters {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, job_key: &str) -> String {
        format!("{}{}/{}", self.base_url, COVER_LETTER_PATH, job_key)
    }
}

impl CoverLetterSource for HttpCoverLetters {
    async fn fetch(&self, job_key: &str) -> Result<Option<CoverLetter>> {
        let url = self.url_for(job_key);
        debug!(%url, "fetching cover letter");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to cover letter API")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Cover letter API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let letter: CoverLetter = response
            .json()
            .await
            .context("Failed to parse cover letter API response")?;
        Ok(Some(letter))
    }
}

// --- Local store source ---

#[derive(Debug, Clone)]
pub struct LocalCoverLetters {
    db_path: PathBuf,
}

impl LocalCoverLetters {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

impl CoverLetterSource for LocalCoverLetters {
    async fn fetch(&self, job_key: &str) -> Result<Option<CoverLetter>> {
        let path = self.db_path.clone();
        let key = job_key.to_string();
        let stored = tokio::task::spawn_blocking(move || Database::open(&path)?.get_cover_letter(&key))
            .await
            .context("Cover letter lookup task failed")??;
        Ok(stored.map(|s| CoverLetter { text: s.text }))
    }
}

/// The source chosen by configuration.
#[derive(Debug, Clone)]
pub enum Source {
    Http(HttpCoverLetters),
    Local(LocalCoverLetters),
}

impl Source {
    pub fn from_config(api_url: Option<&str>, db_path: PathBuf) -> Result<Self> {
        match api_url {
            Some(url) => Ok(Source::Http(HttpCoverLetters::new(url)?)),
            None => Ok(Source::Local(LocalCoverLetters::new(db_path))),
        }
    }
}

impl CoverLetterSource for Source {
    async fn fetch(&self, job_key: &str) -> Result<Option<CoverLetter>> {
        match self {
            Source::Http(source) => source.fetch(job_key).await,
            Source::Local(source) => source.fetch(job_key).await,
        }
    }
}
