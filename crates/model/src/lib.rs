//! Domain types shared by every layer of the restaurant orders backend.
//!
//! Records are serialized with the field names the ordering frontend
//! already consumes (`_id`, `createdAt`, snake_case customer fields).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod reference;
mod status;

pub use reference::{OrderReference, ReferenceError};
pub use status::{CookingStatus, EmailPayload, PaymentStatus, TransactionStatus, UnknownStatus};

/// Length of a well-formed transaction identifier (12 bytes, hex encoded).
pub const TRANSACTION_ID_LEN: usize = 24;

/// Returns true if `id` looks like a transaction identifier: exactly
/// [`TRANSACTION_ID_LEN`] ASCII hex digits.
pub fn is_well_formed_id(id: &str) -> bool {
    id.len() == TRANSACTION_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Stored ids are lowercase hex; callers may send either case.
pub fn canonical_id(id: &str) -> String {
    id.to_ascii_lowercase()
}

/// Transaction: a customer's order for a table together with its payment state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: TransactionStatus,
    pub cooking_status: CookingStatus,
    pub customer_name: String,
    pub customer_email: String,
    pub table_code: String,
    pub total_amount: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// TransactionItem: one line of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionItem {
    #[serde(rename = "_id")]
    pub id: i64,
    pub transaction_id: String,
    pub product_id: String,
    pub product_name: String,
    pub qty: i32,
    pub amount: i64,
}

/// EmailLog: proof that a notification payload was sent for a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailLog {
    pub transaction_id: String,
    pub customer_email: String,
    pub payload: EmailPayload,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Product: a menu entry that can be ordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: i64,
    pub image: String,
}

/// New line item, before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransactionItem {
    pub product_id: String,
    pub product_name: String,
    pub qty: i32,
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_well_formed_id() {
        assert!(is_well_formed_id("64a1f9c2e4b0a1b2c3d4e5f6"));
        assert!(is_well_formed_id("64A1F9C2E4B0A1B2C3D4E5F6"));
        assert!(!is_well_formed_id("64a1f9"));
        assert!(!is_well_formed_id("64a1f9c2e4b0a1b2c3d4e5fz"));
        assert!(!is_well_formed_id(""));
    }

    #[test]
    fn test_canonical_id_is_lowercase() {
        assert_eq!(canonical_id("64A1F9C2E4B0A1B2C3D4E5F6"), "64a1f9c2e4b0a1b2c3d4e5f6");
        assert_eq!(canonical_id("64a1f9"), "64a1f9");
    }

    #[test]
    fn test_serialize_transaction_uses_frontend_names() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let tx = Transaction {
            id: "64a1f9c2e4b0a1b2c3d4e5f6".to_string(),
            status: TransactionStatus::ChallengedByFraudCheck,
            cooking_status: CookingStatus::NotStarted,
            customer_name: "Budi".to_string(),
            customer_email: "budi@example.com".to_string(),
            table_code: "7".to_string(),
            total_amount: 45000,
            created_at: created,
            updated_at: created,
        };

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["_id"], "64a1f9c2e4b0a1b2c3d4e5f6");
        assert_eq!(json["status"], "challengedByFraudCheck");
        assert_eq!(json["cooking_status"], "Not Started");
        assert_eq!(json["createdAt"], "2024-03-01T12:00:00Z");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
