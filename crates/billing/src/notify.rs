//! Outbound notification seam.
//!
//! Sending an invoice may dispatch a templated message to the client. Actual
//! delivery is out of scope here, so the service talks to a [`Notifier`]
//! trait; embedding applications wire a real transport, tests wire the
//! recording implementation, and the no-op default swallows everything.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use rentops_core::{DomainError, DomainResult};

/// Template key for the invoice email.
pub const INVOICE_EMAIL_TEMPLATE: &str = "billing.invoice_email";

/// A templated message about a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub recipient: String,
    /// Document number the message is about (e.g. "INV00042").
    pub document_no: String,
}

/// Outbound message transport.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> DomainResult<()>;
}

impl<N> Notifier for Arc<N>
where
    N: Notifier + ?Sized,
{
    fn send(&self, notification: Notification) -> DomainResult<()> {
        (**self).send(notification)
    }
}

/// Discards every notification.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, _notification: Notification) -> DomainResult<()> {
        Ok(())
    }
}

/// Captures notifications for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.read() {
            Ok(sent) => sent.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) -> DomainResult<()> {
        let mut sent = self
            .sent
            .write()
            .map_err(|_| DomainError::invariant("notifier lock poisoned"))?;
        sent.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_captures_messages() {
        let notifier = RecordingNotifier::new();
        notifier
            .send(Notification {
                template: INVOICE_EMAIL_TEMPLATE.to_string(),
                recipient: "billing@client.example".to_string(),
                document_no: "INV00001".to_string(),
            })
            .unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].document_no, "INV00001");
    }
}
