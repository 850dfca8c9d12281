use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::models::JobPosting;

pub const CONFIG_FILE_NAME: &str = "apply.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailJsConfig {
    pub service_id: Option<String>,
    pub template_id: Option<String>,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    /// Overrides the EmailJS send endpoint.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverLetterConfig {
    /// Base URL of the cover-letter API. The local store is used when unset.
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub job: JobPosting,
    pub emailjs: EmailJsConfig,
    pub cover_letters: CoverLetterConfig,
}

impl AppConfig {
    /// Loads the TOML file (explicit path, or the default one when it
    /// exists) and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML")
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        };
        set(&mut self.emailjs.service_id, "EMAILJS_SERVICE_ID");
        set(&mut self.emailjs.template_id, "EMAILJS_TEMPLATE_ID");
        set(&mut self.emailjs.public_key, "EMAILJS_PUBLIC_KEY");
        set(&mut self.emailjs.private_key, "EMAILJS_PRIVATE_KEY");
        set(&mut self.cover_letters.api_url, "COVER_LETTER_API_URL");

        if let Some(key) = lookup("APPLY_JOB_KEY").filter(|v| !v.is_empty()) {
            self.job.key = key;
        }
        if let Some(title) = lookup("APPLY_JOB_TITLE").filter(|v| !v.is_empty()) {
            self.job.title = title;
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "apply")
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

pub fn default_db_path() -> PathBuf {
    // Use XDG data directory or fallback
    project_dirs()
        .map(|dirs| dirs.data_dir().join("apply.db"))
        .unwrap_or_else(|| PathBuf::from("apply.db"))
}

pub fn default_log_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_local_dir().join("apply.log"))
        .unwrap_or_else(|| PathBuf::from("apply.log"))
}
