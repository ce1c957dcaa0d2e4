use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// A password reset email ready to send
#[derive(Debug, Clone)]
pub struct PasswordResetEmail {
    /// The account holder's address
    pub to: String,
    pub token: String,
    pub reset_url: String,
}

impl PasswordResetEmail {
    pub const SUBJECT: &'static str = "Password reset";

    pub fn new(to: impl Into<String>, token: impl Into<String>, public_base_url: &str) -> Self {
        let token = token.into();
        let reset_url = format!("{}/api/v1/users/resetpassword/{}", public_base_url, token);
        Self {
            to: to.into(),
            token,
            reset_url,
        }
    }

    pub fn html(&self) -> String {
        format!(
            "<strong>Here is your password reset token:</strong>\
             <hr />\
             <p><strong>Token:</strong> {}</p>\
             <p>Submit a PATCH request with your new password and confirmPassword to {}</p>\
             <p>If you didn't request this email, you can safely ignore it.</p>",
            self.token, self.reset_url
        )
    }
}

/// Outbound email delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, email: &PasswordResetEmail) -> Result<(), MailError>;
}

/// Sends through the Resend HTTP API
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    from: String,
    send_to: Option<String>,
    reply_to: Option<String>,
}

impl ResendMailer {
    pub fn new(config: &EmailConfig, api_key: String) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            api_key,
            api_url: config.api_url.clone(),
            from: config.from.clone(),
            send_to: config.send_to.clone(),
            reply_to: config.reply_to.clone(),
        })
    }

    /// Sandbox accounts may only deliver to one fixed address
    fn recipient<'a>(&'a self, email: &'a PasswordResetEmail) -> &'a str {
        self.send_to.as_deref().unwrap_or(&email.to)
    }

    fn payload(&self, email: &PasswordResetEmail) -> Value {
        let mut payload = json!({
            "from": self.from,
            "to": [self.recipient(email)],
            "subject": PasswordResetEmail::SUBJECT,
            "html": email.html(),
        });
        if let Some(reply_to) = &self.reply_to {
            payload["reply_to"] = json!(reply_to);
        }
        payload
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_password_reset(&self, email: &PasswordResetEmail) -> Result<(), MailError> {
        let payload = self.payload(email);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to = self.recipient(email), "Password reset email sent");
        Ok(())
    }
}

/// Writes the reset link to the log instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, email: &PasswordResetEmail) -> Result<(), MailError> {
        tracing::info!(to = %email.to, url = %email.reset_url, "Password reset email (not sent, no API key configured)");
        Ok(())
    }
}

/// Resend when an API key is configured, the log otherwise
pub fn mailer_from_config(config: &EmailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.api_key {
        Some(key) => Ok(Arc::new(ResendMailer::new(config, key.clone())?)),
        None => {
            tracing::warn!("RESEND_API_KEY not set; password reset emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
