//! In-memory store implementing every repository trait, with thread-safe
//! access. Clones share the same data.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use model::{
    CookingStatus, EmailLog, EmailPayload, NewTransactionItem, Product, Transaction,
    TransactionItem, TransactionStatus,
};
use tokio::sync::RwLock;

use crate::{
    EmailLogsRepository, ProductsRepository, RepositoryError, TransactionItemsRepository,
    TransactionsRepository,
};

#[derive(Debug, Default)]
struct Tables {
    transactions: HashMap<String, Transaction>,
    items: BTreeMap<i64, TransactionItem>,
    next_item_id: i64,
    email_logs: HashMap<(String, EmailPayload), EmailLog>,
    products: HashMap<String, Product>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product.
    pub async fn put_product(&self, product: Product) {
        let mut tables = self.inner.write().await;
        tables.products.insert(product.id.clone(), product);
    }

    /// Insert or replace a transaction and append the given items to it.
    pub async fn put_transaction(
        &self,
        transaction: Transaction,
        items: &[NewTransactionItem],
    ) -> Vec<TransactionItem> {
        let mut tables = self.inner.write().await;
        let stored = append_items(&mut tables, &transaction.id, items);
        tables
            .transactions
            .insert(transaction.id.clone(), transaction);
        stored
    }

    /// Snapshot of every email log record.
    pub async fn email_logs(&self) -> Vec<EmailLog> {
        let tables = self.inner.read().await;
        tables.email_logs.values().cloned().collect()
    }

    /// Snapshot of a stored transaction.
    pub async fn transaction(&self, id: &str) -> Option<Transaction> {
        let tables = self.inner.read().await;
        tables.transactions.get(id).cloned()
    }

    /// Number of stored transactions.
    pub async fn transaction_count(&self) -> usize {
        self.inner.read().await.transactions.len()
    }
}

fn append_items(
    tables: &mut Tables,
    transaction_id: &str,
    items: &[NewTransactionItem],
) -> Vec<TransactionItem> {
    let mut stored = Vec::with_capacity(items.len());
    for item in items {
        tables.next_item_id += 1;
        let row = TransactionItem {
            id: tables.next_item_id,
            transaction_id: transaction_id.to_string(),
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            qty: item.qty,
            amount: item.amount,
        };
        tables.items.insert(row.id, row.clone());
        stored.push(row);
    }
    stored
}

#[async_trait]
impl TransactionsRepository for MemoryStore {
    async fn get_by_id(&self, id: &str) -> Result<Transaction, RepositoryError> {
        let tables = self.inner.read().await;
        tables
            .transactions
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let tables = self.inner.read().await;
        let mut found: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn create_with_items(
        &self,
        transaction: &Transaction,
        items: &[NewTransactionItem],
    ) -> Result<Vec<TransactionItem>, RepositoryError> {
        let mut tables = self.inner.write().await;
        if tables.transactions.contains_key(&transaction.id) {
            return Err(RepositoryError::Corrupt(format!(
                "duplicate transaction id {}",
                transaction.id
            )));
        }
        let stored = append_items(&mut tables, &transaction.id, items);
        tables
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(stored)
    }

    async fn update_status(
        &self,
        id: &str,
        status: TransactionStatus,
    ) -> Result<Transaction, RepositoryError> {
        let mut tables = self.inner.write().await;
        let transaction = tables
            .transactions
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        transaction.status = status;
        transaction.updated_at = Utc::now();
        Ok(transaction.clone())
    }

    async fn update_cooking_status(
        &self,
        id: &str,
        cooking_status: CookingStatus,
    ) -> Result<Transaction, RepositoryError> {
        let mut tables = self.inner.write().await;
        let transaction = tables
            .transactions
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        transaction.cooking_status = cooking_status;
        transaction.updated_at = Utc::now();
        Ok(transaction.clone())
    }
}

#[async_trait]
impl TransactionItemsRepository for MemoryStore {
    async fn get_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<TransactionItem>, RepositoryError> {
        let tables = self.inner.read().await;
        Ok(tables
            .items
            .values()
            .filter(|item| item.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn get_by_transaction_ids(
        &self,
        transaction_ids: &[String],
    ) -> Result<Vec<TransactionItem>, RepositoryError> {
        let tables = self.inner.read().await;
        Ok(tables
            .items
            .values()
            .filter(|item| transaction_ids.contains(&item.transaction_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EmailLogsRepository for MemoryStore {
    async fn exists(
        &self,
        transaction_id: &str,
        payload: EmailPayload,
    ) -> Result<bool, RepositoryError> {
        let tables = self.inner.read().await;
        Ok(tables
            .email_logs
            .contains_key(&(transaction_id.to_string(), payload)))
    }

    async fn try_claim(&self, log: &EmailLog) -> Result<bool, RepositoryError> {
        let mut tables = self.inner.write().await;
        let key = (log.transaction_id.clone(), log.payload);
        if tables.email_logs.contains_key(&key) {
            return Ok(false);
        }
        tables.email_logs.insert(key, log.clone());
        Ok(true)
    }

    async fn release(
        &self,
        transaction_id: &str,
        payload: EmailPayload,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().await;
        tables
            .email_logs
            .remove(&(transaction_id.to_string(), payload));
        Ok(())
    }
}

#[async_trait]
impl ProductsRepository for MemoryStore {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.inner.read().await;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }
}
