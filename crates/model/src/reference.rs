use std::fmt;

use thiserror::Error;

const SEPARATOR: char = '-';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("order reference '{0}' has no separator")]
    MissingSeparator(String),
    #[error("order reference '{0}' has an empty transaction id")]
    EmptyTransactionId(String),
}

/// Composite order id sent to the payment gateway:
/// `<prefix>-<transaction id>[-<suffix>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReference {
    pub prefix: String,
    pub transaction_id: String,
    pub suffix: Option<String>,
}

impl OrderReference {
    pub fn new(prefix: &str, transaction_id: &str, suffix: Option<String>) -> Self {
        Self {
            prefix: prefix.to_string(),
            transaction_id: transaction_id.to_string(),
            suffix,
        }
    }

    /// Splits a gateway order id. The transaction id is the segment after
    /// the first separator; everything after the second separator is the suffix.
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let (prefix, rest) = reference
            .split_once(SEPARATOR)
            .ok_or_else(|| ReferenceError::MissingSeparator(reference.to_string()))?;

        let (transaction_id, suffix) = match rest.split_once(SEPARATOR) {
            Some((id, suffix)) => (id, Some(suffix.to_string())),
            None => (rest, None),
        };

        if transaction_id.is_empty() {
            return Err(ReferenceError::EmptyTransactionId(reference.to_string()));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            transaction_id: transaction_id.to_string(),
            suffix,
        })
    }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.prefix, self.transaction_id)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "{SEPARATOR}{suffix}")?;
        }
        Ok(())
    }
}
