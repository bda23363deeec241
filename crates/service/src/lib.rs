//! Business logic layer for restaurant transactions.
//!
//! This module defines the [`TransactionService`] trait and its async implementation
//! [`TransactionServiceImpl`]. The service reconciles payment gateway notifications with
//! stored transactions, lets operators override a transaction's status, opens payments
//! for new checkouts and serves the transaction history used by the kitchen.
//!
//! # Features
//! - Gateway status codes mapped to internal statuses through an exhaustive table.
//! - Success/failure emails sent at most once per transaction and outcome,
//!   see [`NotificationGuard`].
//! - Dependency injection of repositories, mailer and gateway for testability.
//! - Well-typed error handling via [`ServiceError`].

use std::sync::Arc;

use async_trait::async_trait;
use gateway::{GatewayError, PaymentGateway};
use mailer::Mailer;
use model::{Product, Transaction, TransactionItem};
use repository::{
    EmailLogsRepository, ProductsRepository, RepositoryError, TransactionItemsRepository,
    TransactionsRepository,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod checkout;
mod guard;
mod history;
mod manual;
mod reconciler;

pub use checkout::{CartLine, CheckoutRequest, CheckoutResult};
pub use guard::{NotificationGuard, NotifyOutcome};
pub use reconciler::PaymentNotification;

/// The main error type for all operations in [`TransactionService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The gateway order id is missing or is not `<prefix>-<id>[-<suffix>]`.
    #[error("Invalid order_id format: {0}")]
    InvalidReference(String),
    /// A notification's signature did not match.
    #[error("Invalid notification signature")]
    InvalidSignature,
    /// The manual status code is not an integer in 1..=6.
    #[error("Invalid status '{0}'! Status must be between 1 and 6.")]
    InvalidStatusCode(String),
    /// The transaction id is not well formed.
    #[error("Invalid transaction ID format: {0}")]
    InvalidTransactionId(String),
    /// The request is structurally or semantically invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Transaction with ID \"{0}\" not found.")]
    TransactionNotFound(String),
    #[error("No transaction items found for transaction ID \"{0}\".")]
    ItemsNotFound(String),
    #[error("Product with ID \"{0}\" not found.")]
    ProductNotFound(String),
    /// A repository (database) operation failed.
    #[error("Database error: {0}")]
    Db(#[from] RepositoryError),
    /// The payment gateway refused or failed to open a payment.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// A transaction together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub transaction: Transaction,
    pub transaction_items: Vec<TransactionItem>,
}

/// Transactions and the items of all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
    pub transaction_items: Vec<TransactionItem>,
}

/// Settings the service needs from the application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Prefix of the composite order id sent to the gateway.
    pub order_id_prefix: String,
    /// Gateway server key, part of the notification signature.
    pub server_key: String,
    /// Reject notifications with a missing or wrong signature.
    pub verify_signature: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            order_id_prefix: "ORDER".to_string(),
            server_key: String::new(),
            verify_signature: false,
        }
    }
}

/// Trait describing business operations on restaurant transactions.
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Applies a payment gateway notification to the referenced transaction.
    ///
    /// # Errors
    /// [`ServiceError::InvalidReference`] for a malformed `order_id`,
    /// [`ServiceError::InvalidSignature`] when signature checks are on and fail,
    /// [`ServiceError::TransactionNotFound`] / [`ServiceError::ItemsNotFound`]
    /// when the transaction or its items are absent.
    async fn handle_notification(
        &self,
        notification: &PaymentNotification,
    ) -> Result<TransactionDetails, ServiceError>;

    /// Forces a transaction into the status selected by an operator code (1..=6).
    async fn set_status(
        &self,
        transaction_id: &str,
        status_code: &str,
    ) -> Result<TransactionDetails, ServiceError>;

    /// Stores a new transaction for a cart and opens its payment.
    async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResult, ServiceError>;

    /// Transactions in the given internal status, with their items.
    async fn list_by_status(&self, status: &str) -> Result<TransactionList, ServiceError>;

    async fn get_transaction(&self, transaction_id: &str)
    -> Result<TransactionDetails, ServiceError>;

    /// Updates the kitchen progress of a completed transaction.
    async fn update_cooking_status(
        &self,
        transaction_id: &str,
        cooking_status: &str,
    ) -> Result<Transaction, ServiceError>;

    async fn list_products(&self) -> Result<Vec<Product>, ServiceError>;
}

/// Async implementation of [`TransactionService`] using the repository pattern.
pub struct TransactionServiceImpl<T, I, E, P> {
    transactions: T,
    items: I,
    products: P,
    guard: NotificationGuard<E>,
    gateway: Arc<dyn PaymentGateway>,
    settings: ServiceSettings,
}

impl<T, I, E, P> TransactionServiceImpl<T, I, E, P>
where
    T: TransactionsRepository,
    I: TransactionItemsRepository,
    E: EmailLogsRepository,
    P: ProductsRepository,
{
    /// Constructs a new [`TransactionServiceImpl`] from the provided dependencies.
    ///
    /// # Arguments
    /// * `transactions` - Transaction header storage.
    /// * `items` - Line item storage.
    /// * `email_logs` - The email log used to deduplicate notifications.
    /// * `products` - The menu.
    /// * `mailer` - Sender for success and failure emails.
    /// * `gateway` - Payment gateway used at checkout.
    pub fn new(
        transactions: T,
        items: I,
        email_logs: E,
        products: P,
        mailer: Arc<dyn Mailer>,
        gateway: Arc<dyn PaymentGateway>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            transactions,
            items,
            products,
            guard: NotificationGuard::new(email_logs, mailer),
            gateway,
            settings,
        }
    }
}

/// Maps a missing row to [`ServiceError::TransactionNotFound`].
fn transaction_lookup(id: &str) -> impl FnOnce(RepositoryError) -> ServiceError + '_ {
    move |err| match err {
        RepositoryError::NotFound => ServiceError::TransactionNotFound(id.to_string()),
        other => ServiceError::Db(other),
    }
}

#[async_trait]
impl<T, I, E, P> TransactionService for TransactionServiceImpl<T, I, E, P>
where
    T: TransactionsRepository,
    I: TransactionItemsRepository,
    E: EmailLogsRepository,
    P: ProductsRepository,
{
    async fn handle_notification(
        &self,
        notification: &PaymentNotification,
    ) -> Result<TransactionDetails, ServiceError> {
        self.reconcile(notification).await
    }

    async fn set_status(
        &self,
        transaction_id: &str,
        status_code: &str,
    ) -> Result<TransactionDetails, ServiceError> {
        self.override_status(transaction_id, status_code).await
    }

    async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResult, ServiceError> {
        self.open_checkout(request).await
    }

    async fn list_by_status(&self, status: &str) -> Result<TransactionList, ServiceError> {
        self.history_by_status(status).await
    }

    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionDetails, ServiceError> {
        self.details(transaction_id).await
    }

    async fn update_cooking_status(
        &self,
        transaction_id: &str,
        cooking_status: &str,
    ) -> Result<Transaction, ServiceError> {
        self.change_cooking_status(transaction_id, cooking_status)
            .await
    }

    async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.products.list().await?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use gateway::StaticGateway;
    use mailer::RecordingMailer;
    use model::{CookingStatus, NewTransactionItem, Product, Transaction, TransactionStatus};
    use repository::MemoryStore;

    use crate::{ServiceSettings, TransactionServiceImpl};

    pub type MemoryService = TransactionServiceImpl<MemoryStore, MemoryStore, MemoryStore, MemoryStore>;

    pub const TX_ID: &str = "64a1f9c2e4b0a1b2c3d4e5f6";

    pub struct Harness {
        pub store: MemoryStore,
        pub mailer: Arc<RecordingMailer>,
        pub gateway: Arc<StaticGateway>,
        pub service: MemoryService,
    }

    pub fn harness_with(settings: ServiceSettings) -> Harness {
        let store = MemoryStore::new();
        let mailer = Arc::new(RecordingMailer::new());
        let gateway = Arc::new(StaticGateway::new());
        let service = TransactionServiceImpl::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            mailer.clone(),
            gateway.clone(),
            settings,
        );
        Harness {
            store,
            mailer,
            gateway,
            service,
        }
    }

    pub fn harness() -> Harness {
        harness_with(ServiceSettings::default())
    }

    pub fn transaction(id: &str, status: TransactionStatus, age_minutes: i64) -> Transaction {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Transaction {
            id: id.to_string(),
            status,
            cooking_status: CookingStatus::NotStarted,
            customer_name: "Rina".to_string(),
            customer_email: "rina@example.com".to_string(),
            table_code: "5".to_string(),
            total_amount: 40000,
            created_at: created,
            updated_at: created,
        }
    }

    pub fn line(name: &str, qty: i32, amount: i64) -> NewTransactionItem {
        NewTransactionItem {
            product_id: format!("prod-{name}"),
            product_name: name.to_string(),
            qty,
            amount,
        }
    }

    pub fn product(id: &str, name: &str, price: i64) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            price,
            image: format!("/images/{id}.jpg"),
        }
    }

    impl Harness {
        /// Stores a pending transaction with two items.
        pub async fn seed(&self, id: &str) {
            self.store
                .put_transaction(
                    transaction(id, TransactionStatus::Pending, 0),
                    &[line("Nasi Goreng", 1, 25000), line("Es Jeruk", 1, 15000)],
                )
                .await;
        }
    }
}
