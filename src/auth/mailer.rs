//! Outbound email.

use std::sync::Mutex;

/// An email to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery backend for account emails.
pub trait Mailer: Send + Sync {
    /// Deliver a message. Delivery failures are reported, never retried.
    fn send(&self, message: EmailMessage) -> Result<(), String>;
}

/// Mailer that records messages in the log.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: EmailMessage) -> Result<(), String> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email queued: {}", message.body);
        Ok(())
    }
}

/// Mailer that keeps messages in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, message: EmailMessage) -> Result<(), String> {
        self.sent
            .lock()
            .map_err(|e| e.to_string())?
            .push(message);
        Ok(())
    }
}
