//! PostgreSQL implementations of the repository traits.
//!
//! Each repository holds a clone of the shared deadpool pool and takes a
//! connection per call.

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use model::{
    CookingStatus, EmailLog, EmailPayload, NewTransactionItem, Product, Transaction,
    TransactionItem, TransactionStatus,
};
use tokio_postgres::Row;

use crate::{
    EmailLogsRepository, ProductsRepository, RepositoryError, TransactionItemsRepository,
    TransactionsRepository,
};

const TRANSACTION_COLUMNS: &str = "id, status, cooking_status, customer_name, customer_email, \
     table_code, total_amount, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, transaction_id, product_id, product_name, qty, amount";

fn transaction_from_row(row: &Row) -> Result<Transaction, RepositoryError> {
    let status: String = row.try_get("status")?;
    let cooking_status: String = row.try_get("cooking_status")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        status: status
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("{e}")))?,
        cooking_status: cooking_status
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("{e}")))?,
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        table_code: row.try_get("table_code")?,
        total_amount: row.try_get("total_amount")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn item_from_row(row: &Row) -> Result<TransactionItem, RepositoryError> {
    Ok(TransactionItem {
        id: row.try_get("id")?,
        transaction_id: row.try_get("transaction_id")?,
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        qty: row.try_get("qty")?,
        amount: row.try_get("amount")?,
    })
}

/// PostgreSQL implementation of [`TransactionsRepository`].
#[derive(Clone)]
pub struct PgTransactionsRepository {
    pool: Pool,
}

impl PgTransactionsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionsRepository for PgTransactionsRepository {
    async fn get_by_id(&self, id: &str) -> Result<Transaction, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");
        match client.query_opt(query.as_str(), &[&id]).await? {
            Some(row) => transaction_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE status = $1 ORDER BY created_at DESC"
        );
        let rows = client.query(query.as_str(), &[&status.as_str()]).await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn create_with_items(
        &self,
        transaction: &Transaction,
        items: &[NewTransactionItem],
    ) -> Result<Vec<TransactionItem>, RepositoryError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        tx.execute(
            r#"
            INSERT INTO transactions (
                id, status, cooking_status, customer_name, customer_email,
                table_code, total_amount, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            "#,
            &[
                &transaction.id,
                &transaction.status.as_str(),
                &transaction.cooking_status.as_str(),
                &transaction.customer_name,
                &transaction.customer_email,
                &transaction.table_code,
                &transaction.total_amount,
                &transaction.created_at,
                &transaction.updated_at,
            ],
        )
        .await?;

        let insert_item = format!(
            "INSERT INTO transaction_items (transaction_id, product_id, product_name, qty, amount) \
             VALUES ($1,$2,$3,$4,$5) RETURNING {ITEM_COLUMNS}"
        );
        let stmt = tx.prepare(insert_item.as_str()).await?;
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let row = tx
                .query_one(
                    &stmt,
                    &[
                        &transaction.id,
                        &item.product_id,
                        &item.product_name,
                        &item.qty,
                        &item.amount,
                    ],
                )
                .await?;
            stored.push(item_from_row(&row)?);
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn update_status(
        &self,
        id: &str,
        status: TransactionStatus,
    ) -> Result<Transaction, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            "UPDATE transactions SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {TRANSACTION_COLUMNS}"
        );
        match client
            .query_opt(query.as_str(), &[&id, &status.as_str(), &Utc::now()])
            .await?
        {
            Some(row) => transaction_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn update_cooking_status(
        &self,
        id: &str,
        cooking_status: CookingStatus,
    ) -> Result<Transaction, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            "UPDATE transactions SET cooking_status = $2, updated_at = $3 WHERE id = $1 RETURNING {TRANSACTION_COLUMNS}"
        );
        match client
            .query_opt(query.as_str(), &[&id, &cooking_status.as_str(), &Utc::now()])
            .await?
        {
            Some(row) => transaction_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }
}

/// PostgreSQL implementation of [`TransactionItemsRepository`].
#[derive(Clone)]
pub struct PgTransactionItemsRepository {
    pool: Pool,
}

impl PgTransactionItemsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionItemsRepository for PgTransactionItemsRepository {
    async fn get_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<TransactionItem>, RepositoryError> {
        let client = self.pool.get().await?;
        let query =
            format!("SELECT {ITEM_COLUMNS} FROM transaction_items WHERE transaction_id = $1 ORDER BY id");
        let rows = client.query(query.as_str(), &[&transaction_id]).await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn get_by_transaction_ids(
        &self,
        transaction_ids: &[String],
    ) -> Result<Vec<TransactionItem>, RepositoryError> {
        if transaction_ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM transaction_items WHERE transaction_id = ANY($1) ORDER BY id"
        );
        let rows = client.query(query.as_str(), &[&transaction_ids]).await?;
        rows.iter().map(item_from_row).collect()
    }
}

/// PostgreSQL implementation of [`EmailLogsRepository`].
///
/// The primary key on `(transaction_id, payload)` makes `try_claim` atomic:
/// of two concurrent claims only one insert reports a row.
#[derive(Clone)]
pub struct PgEmailLogsRepository {
    pool: Pool,
}

impl PgEmailLogsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailLogsRepository for PgEmailLogsRepository {
    async fn exists(
        &self,
        transaction_id: &str,
        payload: EmailPayload,
    ) -> Result<bool, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT 1 FROM email_logs WHERE transaction_id = $1 AND payload = $2",
                &[&transaction_id, &payload.as_str()],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn try_claim(&self, log: &EmailLog) -> Result<bool, RepositoryError> {
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                r#"
                INSERT INTO email_logs (transaction_id, customer_email, payload, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (transaction_id, payload) DO NOTHING
                "#,
                &[
                    &log.transaction_id,
                    &log.customer_email,
                    &log.payload.as_str(),
                    &log.created_at,
                ],
            )
            .await?;
        Ok(inserted == 1)
    }

    async fn release(
        &self,
        transaction_id: &str,
        payload: EmailPayload,
    ) -> Result<(), RepositoryError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "DELETE FROM email_logs WHERE transaction_id = $1 AND payload = $2",
                &[&transaction_id, &payload.as_str()],
            )
            .await?;
        Ok(())
    }
}

/// PostgreSQL implementation of [`ProductsRepository`].
#[derive(Clone)]
pub struct PgProductsRepository {
    pool: Pool,
}

impl PgProductsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn product_from_row(row: &Row) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        image: row.try_get("image")?,
    })
}

#[async_trait]
impl ProductsRepository for PgProductsRepository {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT id, name, price, image FROM products ORDER BY name", &[])
            .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, name, price, image FROM products WHERE id = ANY($1)",
                &[&ids],
            )
            .await?;
        rows.iter().map(product_from_row).collect()
    }
}
