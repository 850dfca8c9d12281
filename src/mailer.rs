use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, info};

use crate::config::EmailJsConfig;
use crate::submit::TemplateParams;

// --- Provider trait ---

/// Delivers one application email.
pub trait Mailer: Send + Sync {
    fn send(&self, params: &TemplateParams) -> impl Future<Output = Result<()>> + Send;
}

// --- EmailJS provider ---

const EMAILJS_SEND_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

#[derive(Debug, Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: &'a TemplateParams,
}

#[derive(Debug, Clone)]
pub struct EmailJsMailer {
    service_id: String,
    template_id: String,
    public_key: String,
    private_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl EmailJsMailer {
    pub fn new(config: &EmailJsConfig) -> Result<Self> {
        let service_id = required(&config.service_id, "EMAILJS_SERVICE_ID")?;
        let template_id = required(&config.template_id, "EMAILJS_TEMPLATE_ID")?;
        let public_key = required(&config.public_key, "EMAILJS_PUBLIC_KEY")?;
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            service_id,
            template_id,
            public_key,
            private_key: config.private_key.clone().filter(|k| !k.is_empty()),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| EMAILJS_SEND_URL.to_string()),
            client,
        })
    }

    fn request<'a>(&'a self, params: &'a TemplateParams) -> EmailJsRequest<'a> {
        EmailJsRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            access_token: self.private_key.as_deref(),
            template_params: params,
        }
    }
}

fn required(value: &Option<String>, env_var: &str) -> Result<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| {
            format!(
                "{} not configured. Set it with: export {}=... or in the [emailjs] section of apply.toml",
                env_var, env_var
            )
        })
}

impl Mailer for EmailJsMailer {
    async fn send(&self, params: &TemplateParams) -> Result<()> {
        debug!(endpoint = %self.endpoint, to = %params.to_email, "sending application via EmailJS");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request(params))
            .send()
            .await
            .context("Failed to send request to EmailJS")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "EmailJS request failed with status {}: {}",
                status,
                error_text
            ));
        }

        info!(to = %params.to_email, "EmailJS accepted application");
        Ok(())
    }
}
