//! Mailer trait definition and shared error types.

/// Errors that can occur during email delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("invalid address: {0}")]
    Address(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// A single outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Trait for outbound email delivery.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one email. Success or failure is reported synchronously;
    /// no retry is attempted here.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Captures outbound mail instead of delivering it. Test double for
/// tool executors.
#[derive(Default)]
pub struct MemoryMailer {
    sent: tokio::sync::Mutex<Vec<OutboundEmail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured emails, in send order.
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent.lock().await.push(OutboundEmail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
