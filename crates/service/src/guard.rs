//! At-most-once delivery of payment outcome emails.
//!
//! The `(transaction_id, payload)` slot in the email log is claimed with an
//! atomic insert before anything is sent, so concurrent deliveries of the same
//! notification cannot both send. A failed send gives the slot back so the
//! next delivery can try again.

use std::sync::Arc;

use chrono::Utc;
use mailer::Mailer;
use model::{EmailLog, EmailPayload, Transaction, TransactionItem};
use repository::EmailLogsRepository;
use tracing::{error, info, instrument};

/// What the guard did for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The transaction's status does not call for an email.
    NotOwed,
    /// This email was already sent (or is being sent by a concurrent delivery).
    AlreadySent(EmailPayload),
    Sent(EmailPayload),
    /// Claiming, sending or logging failed; the error has been logged.
    Failed(EmailPayload),
}

pub struct NotificationGuard<E> {
    email_logs: E,
    mailer: Arc<dyn Mailer>,
}

impl<E: EmailLogsRepository> NotificationGuard<E> {
    pub fn new(email_logs: E, mailer: Arc<dyn Mailer>) -> Self {
        Self { email_logs, mailer }
    }

    /// Sends the email owed by the transaction's current status, unless it was
    /// sent before. Never fails: problems are logged and reported as
    /// [`NotifyOutcome::Failed`].
    #[instrument(skip_all, fields(transaction_id = %transaction.id, status = %transaction.status))]
    pub async fn notify(
        &self,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> NotifyOutcome {
        let Some(payload) = transaction.status.email_payload() else {
            info!("Email not sent: transaction status does not require one");
            return NotifyOutcome::NotOwed;
        };

        match self.email_logs.exists(&transaction.id, payload).await {
            Ok(true) => {
                info!(%payload, "Email already sent before");
                return NotifyOutcome::AlreadySent(payload);
            }
            Ok(false) => {}
            Err(e) => {
                error!(%payload, error = %e, "Email log lookup failed");
                return NotifyOutcome::Failed(payload);
            }
        }

        let log = EmailLog {
            transaction_id: transaction.id.clone(),
            customer_email: transaction.customer_email.clone(),
            payload,
            created_at: Utc::now(),
        };

        match self.email_logs.try_claim(&log).await {
            Ok(true) => {}
            Ok(false) => {
                info!(%payload, "Email claimed by a concurrent delivery");
                return NotifyOutcome::AlreadySent(payload);
            }
            Err(e) => {
                error!(%payload, error = %e, "Email log write failed");
                return NotifyOutcome::Failed(payload);
            }
        }

        match self
            .mailer
            .send(payload, &transaction.customer_email, transaction, items)
            .await
        {
            Ok(()) => {
                info!(%payload, recipient = %transaction.customer_email, "Email sent");
                NotifyOutcome::Sent(payload)
            }
            Err(e) => {
                error!(%payload, error = %e, "Email sending failed");
                if let Err(e) = self.email_logs.release(&transaction.id, payload).await {
                    error!(%payload, error = %e, "Failed to release email log claim");
                }
                NotifyOutcome::Failed(payload)
            }
        }
    }
}
