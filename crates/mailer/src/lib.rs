//! Transactional email delivery for payment outcomes.
//!
//! [`Mailer`] has one sender per outcome: a success email once a transaction
//! is paid and a failure email once it is cancelled, expired or denied.
//! [`HttpMailer`] delivers through a JSON mail API; [`LogMailer`] only logs the
//! rendered message and is used when no API is configured.

use async_trait::async_trait;
use model::{EmailPayload, Transaction, TransactionItem};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

mod render;
#[cfg(any(test, feature = "testing"))]
mod recording;

pub use render::{Email, format_rupiah, render};
#[cfg(any(test, feature = "testing"))]
pub use recording::{RecordingMailer, SentEmail};

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Mail request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mail API rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_success(
        &self,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError>;

    async fn send_failure(
        &self,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError>;

    /// Sends the email matching `payload`.
    async fn send(
        &self,
        payload: EmailPayload,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError> {
        match payload {
            EmailPayload::Success => self.send_success(recipient, transaction, items).await,
            EmailPayload::Failure => self.send_failure(recipient, transaction, items).await,
        }
    }
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Delivers email by POSTing JSON to a transactional mail API.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }

    #[instrument(skip(self, email), fields(subject = %email.subject))]
    async fn deliver(&self, recipient: &str, email: &Email) -> Result<(), MailerError> {
        let request = MailRequest {
            from: &self.from,
            to: recipient,
            subject: &email.subject,
            text: &email.text,
            html: &email.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(recipient, "Email delivered");
        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_success(
        &self,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError> {
        let email = render(EmailPayload::Success, transaction, items);
        self.deliver(recipient, &email).await
    }

    async fn send_failure(
        &self,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError> {
        let email = render(EmailPayload::Failure, transaction, items);
        self.deliver(recipient, &email).await
    }
}

/// Writes emails to the log instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }

    fn log(&self, recipient: &str, email: &Email) {
        info!(
            recipient,
            subject = %email.subject,
            "Email not sent (no mail API configured):\n{}",
            email.text
        );
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_success(
        &self,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError> {
        self.log(recipient, &render(EmailPayload::Success, transaction, items));
        Ok(())
    }

    async fn send_failure(
        &self,
        recipient: &str,
        transaction: &Transaction,
        items: &[TransactionItem],
    ) -> Result<(), MailerError> {
        self.log(recipient, &render(EmailPayload::Failure, transaction, items));
        Ok(())
    }
}
