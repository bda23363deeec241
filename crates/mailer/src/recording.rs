use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use model::{EmailPayload, Transaction, TransactionItem};

use crate::{Mailer, MailerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub payload: EmailPayload,
    pub recipient: String,
    pub transaction_id: String,
    pub item_count: usize,
}

/// Mailer that remembers what it was asked to send. Can be switched to
/// reject every message.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(
        &self,
        payload: EmailPayload,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailerError::Rejected {
                status: 503,
                body: "mail API unavailable".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentEmail {
                payload,
                recipient: recipient.to_string(),
                transaction_id: transaction.id.clone(),
                item_count: items.len(),
            });
        Ok(())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_success(
        &self,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError> {
        self.record(EmailPayload::Success, recipient, transaction, items)
    }

    async fn send_failure(
        &self,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError> {
        self.record(EmailPayload::Failure, recipient, transaction, items)
    }
}
