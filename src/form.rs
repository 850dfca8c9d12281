use anyhow::Result;
use tracing::{debug, error, info};

use crate::models::{CoverLetter, Draft, Field, JobPosting};
use crate::notify::Notice;
use crate::submit::TemplateParams;
use crate::validation::{self, ValidationErrors};

pub const SENT_MESSAGE: &str = "Application sent successfully!";
pub const FAILED_MESSAGE: &str = "Failed to send application";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Editing,
    Validating,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitDecision {
    /// Validation passed; the caller must deliver these params and report back
    /// through [`FormController::finish_submit`].
    Send(TemplateParams),
    /// Validation failed; errors are attached to the form.
    Rejected,
    /// A submission is already in flight.
    Ignored,
}

/// Owns the draft and drives the submit lifecycle.
#[derive(Debug)]
pub struct FormController {
    job: JobPosting,
    draft: Draft,
    baseline: Option<String>,
    errors: ValidationErrors,
    state: FormState,
    // Once a submit has been attempted, every edit re-validates.
    submitted_once: bool,
}

impl FormController {
    pub fn new(job: JobPosting) -> Self {
        Self {
            job,
            draft: Draft::default(),
            baseline: None,
            errors: ValidationErrors::default(),
            state: FormState::Idle,
            submitted_once: false,
        }
    }

    pub fn job(&self) -> &JobPosting {
        &self.job
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    #[allow(dead_code)]
    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state == FormState::Submitting
    }

    #[allow(dead_code)]
    pub fn baseline(&self) -> Option<&str> {
        self.baseline.as_deref()
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn error_message(&self, field: Field) -> Option<&'static str> {
        self.errors.get(field).map(|e| e.message())
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) -> bool {
        let value = value.into();
        self.edit(field, |s| *s = value)
    }

    /// Applies a mutation to one field. Inputs are inert while submitting.
    pub fn edit(&mut self, field: Field, f: impl FnOnce(&mut String)) -> bool {
        if self.is_submitting() {
            return false;
        }
        f(self.draft.get_mut(field));
        self.state = FormState::Editing;
        if self.submitted_once {
            self.errors = validation::validate(&self.draft).err().unwrap_or_default();
        }
        true
    }

    /// Applies a fetched cover letter. Empty text is treated as no letter.
    pub fn prefill(&mut self, letter: Option<CoverLetter>) {
        let Some(letter) = letter.filter(|l| !l.text.is_empty()) else {
            debug!(job_key = %self.job.key, "no cover letter to prefill");
            return;
        };
        self.baseline = Some(letter.text.clone());
        if !self.is_submitting() {
            self.draft.cover_letter_text = letter.text;
            self.state = FormState::Editing;
        }
    }

    pub fn begin_submit(&mut self) -> SubmitDecision {
        if self.is_submitting() {
            debug!("submit ignored, already in flight");
            return SubmitDecision::Ignored;
        }

        self.state = FormState::Validating;
        self.submitted_once = true;
        match validation::validate(&self.draft) {
            Ok(()) => {
                self.errors = ValidationErrors::default();
                self.state = FormState::Submitting;
                SubmitDecision::Send(TemplateParams::from_draft(&self.draft, &self.job))
            }
            Err(errors) => {
                debug!(count = errors.iter().count(), "validation failed");
                self.errors = errors;
                self.state = FormState::Editing;
                SubmitDecision::Rejected
            }
        }
    }

    /// Ends the in-flight submission and returns the notice to show.
    pub fn finish_submit(&mut self, outcome: Result<()>) -> Notice {
        self.state = FormState::Idle;
        match outcome {
            Ok(()) => {
                info!(job_key = %self.job.key, "application sent");
                self.submitted_once = false;
                self.draft = Draft {
                    company_email: String::new(),
                    cv_url: String::new(),
                    cover_letter_text: self.baseline.clone().unwrap_or_default(),
                };
                Notice::success(SENT_MESSAGE)
            }
            Err(e) => {
                error!("Application send failed: {:#}", e);
                Notice::error(FAILED_MESSAGE)
            }
        }
    }
}
