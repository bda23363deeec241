//! # Data Repository Layer
//!
//! Repository traits for every stored entity: transactions, transaction items,
//! email logs and products. [`pg`] holds the PostgreSQL implementations used in
//! production; [`memory`] holds a shared in-process store used by tests and
//! local tooling.

use async_trait::async_trait;
use deadpool_postgres::PoolError;
use model::{
    CookingStatus, EmailLog, EmailPayload, NewTransactionItem, Product, Transaction,
    TransactionItem, TransactionStatus,
};
use thiserror::Error;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::{
    PgEmailLogsRepository, PgProductsRepository, PgTransactionItemsRepository,
    PgTransactionsRepository,
};

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    /// No result found.
    #[error("Not found")]
    NotFound,
    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// # TransactionsRepository
///
/// Storage of transaction headers. Every update overwrites the stored value
/// and bumps `updated_at`; no transition rules are enforced here.
#[async_trait]
pub trait TransactionsRepository: Send + Sync {
    /// Get a transaction by its id, or [`RepositoryError::NotFound`].
    async fn get_by_id(&self, id: &str) -> Result<Transaction, RepositoryError>;

    /// All transactions in `status`, newest first.
    async fn list_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, RepositoryError>;

    /// Atomically stores a new transaction together with its items.
    async fn create_with_items(
        &self,
        transaction: &Transaction,
        items: &[NewTransactionItem],
    ) -> Result<Vec<TransactionItem>, RepositoryError>;

    /// Overwrites the payment status and returns the stored row.
    async fn update_status(
        &self,
        id: &str,
        status: TransactionStatus,
    ) -> Result<Transaction, RepositoryError>;

    /// Overwrites the cooking status and returns the stored row.
    async fn update_cooking_status(
        &self,
        id: &str,
        cooking_status: CookingStatus,
    ) -> Result<Transaction, RepositoryError>;
}

/// # TransactionItemsRepository
///
/// Line items, looked up by the transaction they reference.
#[async_trait]
pub trait TransactionItemsRepository: Send + Sync {
    async fn get_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<TransactionItem>, RepositoryError>;

    async fn get_by_transaction_ids(
        &self,
        transaction_ids: &[String],
    ) -> Result<Vec<TransactionItem>, RepositoryError>;
}

/// # EmailLogsRepository
///
/// The log of sent notifications, keyed by `(transaction_id, payload)`.
#[async_trait]
pub trait EmailLogsRepository: Send + Sync {
    async fn exists(
        &self,
        transaction_id: &str,
        payload: EmailPayload,
    ) -> Result<bool, RepositoryError>;

    /// Inserts `log` unless a record with the same key exists.
    /// Returns `true` only for the caller whose insert took effect.
    async fn try_claim(&self, log: &EmailLog) -> Result<bool, RepositoryError>;

    /// Removes a claim so a later delivery may send again.
    async fn release(
        &self,
        transaction_id: &str,
        payload: EmailPayload,
    ) -> Result<(), RepositoryError>;
}

/// # ProductsRepository
///
/// Read access to the menu.
#[async_trait]
pub trait ProductsRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Products whose id is in `ids`; missing ids are simply absent from the result.
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, RepositoryError>;
}
