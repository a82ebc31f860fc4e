//! Email delivery through a Resend-compatible HTTP API.
//!
//! One `POST {base_url}/emails` per reminder, no internal retry.
//! Docs: <https://resend.com/docs/api-reference/emails/send-email>

pub mod template;


use async_trait::async_trait;
use followup_core::{
    config::EmailConfig,
    error::{ErrorKind, FollowupError},
    record::{ApplicationRecord, Recipient},
    traits::{DeliveryChannel, DeliveryResult},
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Authoritative reminder channel.
pub struct EmailChannel {
    config: EmailConfig,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl EmailChannel {
    /// Create an email channel from config.
    pub fn new(config: EmailConfig) -> Result<Self, FollowupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| FollowupError::Config(format!("failed to build http client: {e}")))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            config,
            client,
            base_url,
        })
    }

    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    async fn post(&self, record: &ApplicationRecord, recipient: &Recipient) -> Result<(), String> {
        let email = template::render(record, recipient);
        let body = SendEmailRequest {
            from: &self.config.from,
            to: vec![recipient.email.as_str()],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let url = format!("{}/emails", self.base_url);
        debug!("email: POST {url} for application {}", record.id);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("email request failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("email provider returned {status}: {text}"));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn is_authoritative(&self) -> bool {
        true
    }

    async fn send(&self, record: &ApplicationRecord, recipient: &Recipient) -> DeliveryResult {
        if recipient.email.trim().is_empty() {
            return DeliveryResult::failed(ErrorKind::MissingRecipient, "recipient has no email");
        }
        if !self.config.enabled {
            return DeliveryResult::failed(ErrorKind::DeliveryFailed, "email channel disabled");
        }
        if !self.is_configured() {
            return DeliveryResult::failed(
                ErrorKind::DeliveryFailed,
                "email api key not configured",
            );
        }

        match self.post(record, recipient).await {
            Ok(()) => DeliveryResult::delivered(),
            Err(cause) => {
                warn!("email delivery for {} failed: {cause}", record.id);
                DeliveryResult::failed(ErrorKind::DeliveryFailed, cause)
            }
        }
    }
}
