use regex::Regex;
use reqwest::Url;
use std::fmt;
use std::sync::LazyLock;

use crate::models::{Draft, Field};

pub const MIN_COVER_LETTER_CHARS: usize = 30;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Required,
    Format,
    TooShort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub kind: ErrorKind,
}

impl FieldError {
    fn new(field: Field, kind: ErrorKind) -> Self {
        Self { field, kind }
    }

    pub fn message(&self) -> &'static str {
        match (self.field, self.kind) {
            (Field::CompanyEmail, ErrorKind::Required) => "Company email is required",
            (Field::CompanyEmail, _) => "Invalid email address",
            (Field::CvUrl, ErrorKind::Required) => "CV URL is required",
            (Field::CvUrl, _) => "Please enter a valid CV URL",
            (Field::CoverLetterText, _) => "Cover letter must be at least 30 characters long",
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field.label(), self.message())
    }
}

/// Every rule violation found in a draft, at most one per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    #[allow(dead_code)]
    pub fn kind(&self, field: Field) -> Option<ErrorKind> {
        self.get(field).map(|e| e.kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }
}

pub fn validate(draft: &Draft) -> Result<(), ValidationErrors> {
    let errors: Vec<FieldError> = [
        check_email(&draft.company_email),
        check_url(&draft.cv_url),
        check_cover_letter(&draft.cover_letter_text),
    ]
    .into_iter()
    .flatten()
    .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { errors })
    }
}

fn check_email(value: &str) -> Option<FieldError> {
    if value.is_empty() {
        Some(FieldError::new(Field::CompanyEmail, ErrorKind::Required))
    } else if !is_valid_email(value) {
        Some(FieldError::new(Field::CompanyEmail, ErrorKind::Format))
    } else {
        None
    }
}

fn check_url(value: &str) -> Option<FieldError> {
    if value.is_empty() {
        Some(FieldError::new(Field::CvUrl, ErrorKind::Required))
    } else if Url::parse(value).is_err() {
        Some(FieldError::new(Field::CvUrl, ErrorKind::Format))
    } else {
        None
    }
}

/// Length in UTF-16 code units, the unit browsers report for form fields.
fn letter_length(value: &str) -> usize {
    value.encode_utf16().count()
}

fn check_cover_letter(value: &str) -> Option<FieldError> {
    if letter_length(value) < MIN_COVER_LETTER_CHARS {
        Some(FieldError::new(Field::CoverLetterText, ErrorKind::TooShort))
    } else {
        None
    }
}

pub fn is_valid_email(value: &str) -> bool {
    !value.starts_with('.') && !value.contains("..") && EMAIL_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(email: &str, url: &str, letter: &str) -> Draft {
        Draft {
            company_email: email.to_string(),
            cv_url: url.to_string(),
            cover_letter_text: letter.to_string(),
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        let d = draft("hr@acme.com", "https://drive.google.com/x", &"A".repeat(40));
        assert!(validate(&d).is_ok());
    }

    #[test]
    fn test_empty_email_is_required_error() {
        let d = draft("", "https://drive.google.com/x", &"A".repeat(40));
        let errors = validate(&d).unwrap_err();
        assert_eq!(errors.kind(Field::CompanyEmail), Some(ErrorKind::Required));
        assert_eq!(
            errors.get(Field::CompanyEmail).unwrap().message(),
            "Company email is required"
        );
    }

    #[test]
    fn test_malformed_email_is_format_error() {
        for bad in ["not-an-email", "a@b", "@acme.com", ".hr@acme.com", "hr..x@acme.com", "hr@acme.c", " hr@acme.com"] {
            let d = draft(bad, "https://drive.google.com/x", &"A".repeat(40));
            let errors = validate(&d).unwrap_err();
            assert_eq!(errors.kind(Field::CompanyEmail), Some(ErrorKind::Format), "{}", bad);
        }
    }

    #[test]
    fn test_accepts_common_email_shapes() {
        assert!(is_valid_email("hr@acme.com"));
        assert!(is_valid_email("jobs+cpp@mail.acme.co.uk"));
        assert!(is_valid_email("first.last@sub-domain.example.org"));
        assert!(is_valid_email("o'brien@acme.io"));
    }

    #[test]
    fn test_cv_url_rules() {
        let letter = "A".repeat(40);
        let errors = validate(&draft("hr@acme.com", "", &letter)).unwrap_err();
        assert_eq!(errors.kind(Field::CvUrl), Some(ErrorKind::Required));

        let errors = validate(&draft("hr@acme.com", "drive.google.com/x", &letter)).unwrap_err();
        assert_eq!(errors.kind(Field::CvUrl), Some(ErrorKind::Format));
        assert_eq!(errors.get(Field::CvUrl).unwrap().message(), "Please enter a valid CV URL");

        assert!(validate(&draft("hr@acme.com", "https://dropbox.com/s/cv.pdf", &letter)).is_ok());
    }

    #[test]
    fn test_cover_letter_length_boundary() {
        let errors = validate(&draft("hr@acme.com", "https://x.io", &"A".repeat(29))).unwrap_err();
        assert_eq!(errors.kind(Field::CoverLetterText), Some(ErrorKind::TooShort));

        assert!(validate(&draft("hr@acme.com", "https://x.io", &"A".repeat(30))).is_ok());
    }

    #[test]
    fn test_empty_cover_letter_is_too_short_not_required() {
        let errors = validate(&draft("hr@acme.com", "https://x.io", "")).unwrap_err();
        assert_eq!(errors.kind(Field::CoverLetterText), Some(ErrorKind::TooShort));
    }

    #[test]
    fn test_cover_letter_counts_utf16_units_not_bytes() {
        // 30 two-byte characters, one UTF-16 unit each
        let letter = "é".repeat(30);
        assert!(validate(&draft("hr@acme.com", "https://x.io", &letter)).is_ok());
    }

    #[test]
    fn test_astral_characters_count_as_two_units() {
        // 15 emoji are 30 UTF-16 units
        let letter = "\u{1F600}".repeat(15);
        assert_eq!(letter_length(&letter), 30);
        assert!(validate(&draft("hr@acme.com", "https://x.io", &letter)).is_ok());

        let short = "\u{1F600}".repeat(14);
        let errors = validate(&draft("hr@acme.com", "https://x.io", &short)).unwrap_err();
        assert_eq!(errors.kind(Field::CoverLetterText), Some(ErrorKind::TooShort));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let errors = validate(&Draft::default()).unwrap_err();
        assert_eq!(errors.iter().count(), 3);
        assert_eq!(errors.kind(Field::CompanyEmail), Some(ErrorKind::Required));
        assert_eq!(errors.kind(Field::CvUrl), Some(ErrorKind::Required));
        assert_eq!(errors.kind(Field::CoverLetterText), Some(ErrorKind::TooShort));
    }
}
