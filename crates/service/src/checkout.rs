//! Checkout: turn a cart into a stored transaction and open its payment.

use std::collections::HashMap;

use chrono::Utc;
use gateway::{PaymentItem, PaymentRequest};
use model::{
    CookingStatus, NewTransactionItem, OrderReference, Transaction, TransactionItem,
    TransactionStatus,
};
use repository::{
    EmailLogsRepository, ProductsRepository, TransactionItemsRepository, TransactionsRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{ServiceError, TransactionServiceImpl};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub qty: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub table_code: String,
    pub customer_name: String,
    pub customer_email: String,
    pub products: Vec<CartLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub transaction: Transaction,
    pub transaction_items: Vec<TransactionItem>,
    pub token: String,
    pub redirect_url: String,
}

/// A fresh 24 hex digit transaction id.
fn new_transaction_id() -> String {
    hex::encode(rand::random::<[u8; 12]>())
}

fn invalid(msg: &str) -> ServiceError {
    ServiceError::InvalidRequest(msg.to_string())
}

impl CheckoutRequest {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.table_code.trim().is_empty() {
            return Err(invalid("table_code is required"));
        }
        if self.customer_name.trim().is_empty() {
            return Err(invalid("customer_name is required"));
        }
        let email = self.customer_email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(invalid("customer_email must be a valid email address"));
        }
        if self.products.is_empty() {
            return Err(invalid("cart is empty"));
        }
        if self.products.iter().any(|line| line.qty < 1) {
            return Err(invalid("every product needs a qty of at least 1"));
        }
        Ok(())
    }

    /// Cart lines with repeated products merged, in first-seen order.
    fn merged_lines(&self) -> Result<Vec<(String, i32)>, ServiceError> {
        let mut merged: Vec<(String, i32)> = Vec::with_capacity(self.products.len());
        for line in &self.products {
            match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, qty)) => {
                    *qty = qty
                        .checked_add(line.qty)
                        .ok_or_else(|| invalid("qty is too large"))?;
                }
                None => merged.push((line.product_id.clone(), line.qty)),
            }
        }
        Ok(merged)
    }
}

impl<T, I, E, P> TransactionServiceImpl<T, I, E, P>
where
    T: TransactionsRepository,
    I: TransactionItemsRepository,
    E: EmailLogsRepository,
    P: ProductsRepository,
{
    #[instrument(skip(self, request), fields(table_code = %request.table_code))]
    pub(crate) async fn open_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResult, ServiceError> {
        request.validate()?;
        let lines = request.merged_lines()?;

        let ids: Vec<String> = lines.iter().map(|(id, _)| id.clone()).collect();
        let catalog: HashMap<String, _> = self
            .products
            .get_by_ids(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();

        let mut new_items = Vec::with_capacity(lines.len());
        let mut payment_items = Vec::with_capacity(lines.len());
        let mut total: i64 = 0;
        for (product_id, qty) in &lines {
            let product = catalog
                .get(product_id)
                .ok_or_else(|| ServiceError::ProductNotFound(product_id.clone()))?;
            let amount = product
                .price
                .checked_mul(i64::from(*qty))
                .ok_or_else(|| invalid("order amount is too large"))?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| invalid("order amount is too large"))?;

            new_items.push(NewTransactionItem {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                qty: *qty,
                amount,
            });
            payment_items.push(PaymentItem {
                id: product.id.clone(),
                name: product.name.clone(),
                price: product.price,
                quantity: *qty,
            });
        }

        let now = Utc::now();
        let transaction = Transaction {
            id: new_transaction_id(),
            status: TransactionStatus::Pending,
            cooking_status: CookingStatus::NotStarted,
            customer_name: request.customer_name.trim().to_string(),
            customer_email: request.customer_email.trim().to_string(),
            table_code: request.table_code.trim().to_string(),
            total_amount: total,
            created_at: now,
            updated_at: now,
        };

        // The payment is opened before anything is stored, so a gateway
        // failure leaves no pending transaction behind.
        let reference = OrderReference::new(
            &self.settings.order_id_prefix,
            &transaction.id,
            Some(now.timestamp().to_string()),
        );
        let session = self
            .gateway
            .create_payment(&PaymentRequest {
                order_id: reference.to_string(),
                gross_amount: total,
                customer_name: transaction.customer_name.clone(),
                customer_email: transaction.customer_email.clone(),
                items: payment_items,
            })
            .await?;

        let transaction_items = self
            .transactions
            .create_with_items(&transaction, &new_items)
            .await
            .inspect_err(|e| {
                warn!(
                    order_id = %reference,
                    error = %e,
                    "Payment opened but transaction could not be stored"
                );
            })?;

        info!(
            transaction_id = %transaction.id,
            order_id = %reference,
            total,
            "Transaction created and payment opened"
        );

        Ok(CheckoutResult {
            transaction,
            transaction_items,
            token: session.token,
            redirect_url: session.redirect_url,
        })
    }
}
