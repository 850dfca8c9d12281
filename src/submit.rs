use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

use crate::form::{FormController, SubmitDecision};
use crate::mailer::Mailer;
use crate::models::{Draft, JobPosting};
use crate::notify::Notifier;

/// The fixed mapping from a draft onto the email template variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParams {
    pub to_email: String,
    pub cover_letter: String,
    pub job_title: String,
    pub cv_url: String,
}

impl TemplateParams {
    pub fn from_draft(draft: &Draft, job: &JobPosting) -> Self {
        Self {
            to_email: draft.company_email.trim().to_string(),
            cover_letter: draft.cover_letter_text.clone(),
            job_title: job.title.clone(),
            cv_url: draft.cv_url.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Sent,
    Failed,
    Rejected,
    Ignored,
}

/// Validates, sends and settles one submission in place.
pub async fn submit<M: Mailer>(
    form: &mut FormController,
    mailer: &M,
    notifier: &mut impl Notifier,
) -> Submission {
    match form.begin_submit() {
        SubmitDecision::Send(params) => {
            let outcome = mailer.send(&params).await;
            let sent = outcome.is_ok();
            notifier.notify(form.finish_submit(outcome));
            if sent { Submission::Sent } else { Submission::Failed }
        }
        SubmitDecision::Rejected => Submission::Rejected,
        SubmitDecision::Ignored => Submission::Ignored,
    }
}

/// Runs the delivery call on the runtime and reports the outcome back to the
/// UI loop, which settles the form with it.
pub fn spawn_submission<M, E>(
    runtime: &Handle,
    mailer: Arc<M>,
    params: TemplateParams,
    tx: UnboundedSender<E>,
    wrap: fn(Result<()>) -> E,
) where
    M: Mailer + 'static,
    E: Send + 'static,
{
    runtime.spawn(async move {
        let outcome = mailer.send(&params).await;
        // The receiver is gone once the UI has exited.
        let _ = tx.send(wrap(outcome));
    });
}
