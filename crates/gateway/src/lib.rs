//! Payment gateway integration (Midtrans Snap).
//!
//! Opening a payment returns a Snap token and a redirect URL for the
//! customer. The gateway later reports the outcome asynchronously through the
//! payment notification webhook; [`verify_signature`] authenticates those
//! notifications.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[cfg(any(test, feature = "testing"))]
mod fake;
#[cfg(any(test, feature = "testing"))]
pub use fake::StaticGateway;

/// Midtrans rejects item names longer than this.
const MAX_ITEM_NAME_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gateway rejected payment with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentItem {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

/// Everything the gateway needs to open a payment for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_id: String,
    pub gross_amount: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<PaymentItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub token: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentSession, GatewayError>;
}

#[derive(Serialize)]
struct SnapTransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Serialize)]
struct SnapCustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct SnapRequest<'a> {
    transaction_details: SnapTransactionDetails<'a>,
    item_details: Vec<PaymentItem>,
    customer_details: SnapCustomerDetails<'a>,
}

#[derive(Deserialize)]
struct SnapErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
}

/// Client for the Midtrans Snap transaction API.
#[derive(Debug, Clone)]
pub struct MidtransSnap {
    client: reqwest::Client,
    snap_url: String,
    server_key: String,
}

impl MidtransSnap {
    pub fn new(snap_url: String, server_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            snap_url,
            server_key,
        }
    }

    fn authorization(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:", self.server_key)))
    }
}

#[async_trait]
impl PaymentGateway for MidtransSnap {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentSession, GatewayError> {
        let body = SnapRequest {
            transaction_details: SnapTransactionDetails {
                order_id: &request.order_id,
                gross_amount: request.gross_amount,
            },
            item_details: request
                .items
                .iter()
                .map(|item| PaymentItem {
                    name: item.name.chars().take(MAX_ITEM_NAME_LEN).collect(),
                    ..item.clone()
                })
                .collect(),
            customer_details: SnapCustomerDetails {
                first_name: &request.customer_name,
                email: &request.customer_email,
            },
        };

        let response = self
            .client
            .post(&self.snap_url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SnapErrorBody>(&text)
                .map(|b| b.error_messages.join("; "))
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(text);
            warn!(status = status.as_u16(), %message, "Snap rejected payment");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: PaymentSession = response.json().await?;
        info!("Snap payment opened");
        Ok(session)
    }
}

/// Computes the notification signature:
/// `hex(sha512(order_id + status_code + gross_amount + server_key))`.
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks a notification's `signature_key` against the expected signature.
pub fn verify_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    signature_key: &str,
) -> bool {
    let expected = notification_signature(order_id, status_code, gross_amount, server_key);
    constant_time_eq(expected.as_bytes(), signature_key.to_ascii_lowercase().as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
