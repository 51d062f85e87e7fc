use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("Mail rejected: {0}")]
    Rejected(String),

    #[error("Mail transport unavailable: {0}")]
    Transport(String),
}

/// A file attached by reference; the mail service downloads it itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Sends a message with attachments.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Mailer that keeps every message it accepts.
#[derive(Debug, Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<MailMessage>>,
    reject_with: Option<String>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer that rejects every message with `reason`.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject_with: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if let Some(reason) = &self.reject_with {
            return Err(MailError::Rejected(reason.clone()));
        }
        info!(
            to = %message.to,
            attachments = message.attachments.len(),
            "queued mail"
        );
        self.sent.lock().push(message);
        Ok(())
    }
}
