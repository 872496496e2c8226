//! Outgoing email

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("no recipients")]
    NoRecipients,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    async fn send_email(&self, subject: &str, content: &str, to: &[String]) -> Result<(), MailError>;
}

/// Writes emails to the log instead of delivering them.
pub struct LogEmailSender {
    from: String,
}

impl LogEmailSender {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_email(&self, subject: &str, content: &str, to: &[String]) -> Result<(), MailError> {
        if to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        tracing::info!(
            from = %self.from,
            to = ?to,
            subject,
            content,
            "Email sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sender_requires_recipient() {
        let sender = LogEmailSender::new("noreply@metabank.local");
        assert!(matches!(
            sender.send_email("s", "c", &[]).await,
            Err(MailError::NoRecipients)
        ));
        assert!(
            sender
                .send_email("s", "c", &["a@example.com".to_string()])
                .await
                .is_ok()
        );
    }
}
