use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored or requested status string has no variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Internal payment state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    Pending,
    ChallengedByFraudCheck,
    Completed,
    Denied,
    Expired,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Pending,
        TransactionStatus::ChallengedByFraudCheck,
        TransactionStatus::Completed,
        TransactionStatus::Denied,
        TransactionStatus::Expired,
        TransactionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::ChallengedByFraudCheck => "challengedByFraudCheck",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Denied => "denied",
            TransactionStatus::Expired => "expired",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Status selected by an operator's numeric code (1..=6).
    pub fn from_manual_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TransactionStatus::Pending),
            2 => Some(TransactionStatus::ChallengedByFraudCheck),
            3 => Some(TransactionStatus::Completed),
            4 => Some(TransactionStatus::Denied),
            5 => Some(TransactionStatus::Expired),
            6 => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    /// Which notification, if any, a transaction in this status is owed.
    pub fn email_payload(&self) -> Option<EmailPayload> {
        match self {
            TransactionStatus::Completed => Some(EmailPayload::Success),
            TransactionStatus::Cancelled
            | TransactionStatus::Expired
            | TransactionStatus::Denied => Some(EmailPayload::Failure),
            TransactionStatus::Pending | TransactionStatus::ChallengedByFraudCheck => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Status vocabulary reported by the payment gateway in its notifications.
///
/// Codes are matched case-sensitively; anything unrecognised is kept as
/// [`PaymentStatus::Other`] and treated as still pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Settlement,
    Capture,
    Pending,
    Cancel,
    Refund,
    Expire,
    Deny,
    Challenge,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(code: &str) -> Self {
        match code {
            "settlement" => PaymentStatus::Settlement,
            "capture" => PaymentStatus::Capture,
            "pending" => PaymentStatus::Pending,
            "cancel" => PaymentStatus::Cancel,
            "refund" => PaymentStatus::Refund,
            "expire" => PaymentStatus::Expire,
            "deny" => PaymentStatus::Deny,
            "challenge" => PaymentStatus::Challenge,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn to_transaction_status(&self) -> TransactionStatus {
        match self {
            PaymentStatus::Settlement | PaymentStatus::Capture => TransactionStatus::Completed,
            PaymentStatus::Pending => TransactionStatus::Pending,
            PaymentStatus::Cancel | PaymentStatus::Refund => TransactionStatus::Cancelled,
            PaymentStatus::Expire => TransactionStatus::Expired,
            PaymentStatus::Deny => TransactionStatus::Denied,
            PaymentStatus::Challenge => TransactionStatus::ChallengedByFraudCheck,
            PaymentStatus::Other(_) => TransactionStatus::Pending,
        }
    }
}

/// Kind of notification email recorded in the email log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailPayload {
    #[serde(rename = "Success Transaction")]
    Success,
    #[serde(rename = "Fail Transaction")]
    Failure,
}

impl EmailPayload {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailPayload::Success => "Success Transaction",
            EmailPayload::Failure => "Fail Transaction",
        }
    }
}

impl fmt::Display for EmailPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailPayload {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success Transaction" => Ok(EmailPayload::Success),
            "Fail Transaction" => Ok(EmailPayload::Failure),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Kitchen progress of a paid transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CookingStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "Being Cooked")]
    BeingCooked,
    #[serde(rename = "Ready to Serve")]
    ReadyToServe,
    #[serde(rename = "Completed")]
    Completed,
}

impl CookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CookingStatus::NotStarted => "Not Started",
            CookingStatus::BeingCooked => "Being Cooked",
            CookingStatus::ReadyToServe => "Ready to Serve",
            CookingStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for CookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not Started" => Ok(CookingStatus::NotStarted),
            "Being Cooked" => Ok(CookingStatus::BeingCooked),
            "Ready to Serve" => Ok(CookingStatus::ReadyToServe),
            "Completed" => Ok(CookingStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
