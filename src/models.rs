use serde::{Deserialize, Serialize};

pub const DEFAULT_JOB_KEY: &str = "cpp";
pub const DEFAULT_JOB_TITLE: &str = "C++ Software Engineer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CompanyEmail,
    CvUrl,
    CoverLetterText,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::CompanyEmail, Field::CvUrl, Field::CoverLetterText];

    pub fn label(self) -> &'static str {
        match self {
            Field::CompanyEmail => "Company email",
            Field::CvUrl => "CV URL",
            Field::CoverLetterText => "Cover letter",
        }
    }
}

/// In-progress form data for one application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub company_email: String,
    pub cv_url: String,
    pub cover_letter_text: String,
}

impl Draft {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::CompanyEmail => &self.company_email,
            Field::CvUrl => &self.cv_url,
            Field::CoverLetterText => &self.cover_letter_text,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::CompanyEmail => &mut self.company_email,
            Field::CvUrl => &mut self.cv_url,
            Field::CoverLetterText => &mut self.cover_letter_text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPosting {
    pub key: String,
    pub title: String,
}

impl Default for JobPosting {
    fn default() -> Self {
        Self {
            key: DEFAULT_JOB_KEY.to_string(),
            title: DEFAULT_JOB_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverLetter {
    pub text: String,
}

/// A stored cover letter row from the local store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCoverLetter {
    pub job_key: String,
    pub text: String,
    pub updated_at: String,
}
