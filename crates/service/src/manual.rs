//! Operator override of a transaction's payment status.

use model::{TransactionStatus, canonical_id, is_well_formed_id};
use repository::{
    EmailLogsRepository, ProductsRepository, TransactionItemsRepository, TransactionsRepository,
};
use tracing::{info, instrument};

use crate::{ServiceError, TransactionDetails, TransactionServiceImpl, transaction_lookup};

impl<T, I, E, P> TransactionServiceImpl<T, I, E, P>
where
    T: TransactionsRepository,
    I: TransactionItemsRepository,
    E: EmailLogsRepository,
    P: ProductsRepository,
{
    /// Validation order is status code, then id format, then existence, so a
    /// bad code is reported even for an unknown transaction.
    #[instrument(skip(self))]
    pub(crate) async fn override_status(
        &self,
        transaction_id: &str,
        status_code: &str,
    ) -> Result<TransactionDetails, ServiceError> {
        let status = status_code
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(TransactionStatus::from_manual_code)
            .ok_or_else(|| ServiceError::InvalidStatusCode(status_code.to_string()))?;

        if !is_well_formed_id(transaction_id) {
            return Err(ServiceError::InvalidTransactionId(transaction_id.to_string()));
        }
        let id = canonical_id(transaction_id);
        let transaction_id = id.as_str();

        let existing = self
            .transactions
            .get_by_id(transaction_id)
            .await
            .map_err(transaction_lookup(transaction_id))?;

        let updated = self
            .transactions
            .update_status(&existing.id, status)
            .await
            .map_err(transaction_lookup(transaction_id))?;

        // Unlike the webhook path, a transaction without items is accepted here.
        let items = self.items.get_by_transaction_id(transaction_id).await?;

        info!(
            previous_status = %existing.status,
            status = %status,
            "Transaction status set manually"
        );

        self.guard.notify(&updated, &items).await;

        Ok(TransactionDetails {
            transaction: updated,
            transaction_items: items,
        })
    }
}

#[cfg(test)]
mod tests {
    use model::{EmailPayload, TransactionStatus};

    use crate::test_support::{TX_ID, harness, transaction};
    use crate::{ServiceError, TransactionService};

    #[tokio::test]
    async fn test_codes_map_to_statuses() {
        let expected = [
            ("1", TransactionStatus::Pending),
            ("2", TransactionStatus::ChallengedByFraudCheck),
            ("3", TransactionStatus::Completed),
            ("4", TransactionStatus::Denied),
            ("5", TransactionStatus::Expired),
            ("6", TransactionStatus::Cancelled),
        ];
        for (code, status) in expected {
            let h = harness();
            h.seed(TX_ID).await;
            let details = h.service.set_status(TX_ID, code).await.unwrap();
            assert_eq!(details.transaction.status, status);
            assert_eq!(h.store.transaction(TX_ID).await.unwrap().status, status);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_code_writes_nothing() {
        let h = harness();
        h.seed(TX_ID).await;

        for code in ["0", "7", "-1", "abc", "", "3.5"] {
            let err = h.service.set_status(TX_ID, code).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidStatusCode(_)), "{code}");
        }
        assert_eq!(h.store.transaction(TX_ID).await.unwrap().status, TransactionStatus::Pending);
        assert!(h.mailer.sent().is_empty());
        assert!(h.store.email_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_id_is_rejected() {
        let h = harness();
        let err = h.service.set_status("64a1f9", "3").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransactionId(_)));
    }

    #[tokio::test]
    async fn test_uppercase_id_finds_stored_transaction() {
        let h = harness();
        h.seed(TX_ID).await;

        let details = h
            .service
            .set_status(&TX_ID.to_ascii_uppercase(), "3")
            .await
            .unwrap();

        assert_eq!(details.transaction.id, TX_ID);
        assert_eq!(details.transaction_items.len(), 2);
        assert_eq!(
            h.store.transaction(TX_ID).await.unwrap().status,
            TransactionStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let h = harness();
        let err = h
            .service
            .set_status("aaaaaaaaaaaaaaaaaaaaaaaa", "3")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TransactionNotFound(_)));
    }

    #[tokio::test]
    async fn test_completion_sends_success_once() {
        let h = harness();
        h.seed(TX_ID).await;

        h.service.set_status(TX_ID, "3").await.unwrap();
        h.service.set_status(TX_ID, "3").await.unwrap();

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, EmailPayload::Success);
    }

    #[tokio::test]
    async fn test_failure_email_even_without_items() {
        let h = harness();
        h.store
            .put_transaction(transaction(TX_ID, TransactionStatus::Pending, 0), &[])
            .await;

        let details = h.service.set_status(TX_ID, "5").await.unwrap();

        assert!(details.transaction_items.is_empty());
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, EmailPayload::Failure);
        assert_eq!(sent[0].item_count, 0);
    }

    #[tokio::test]
    async fn test_webhook_and_manual_share_the_log() {
        let h = harness();
        h.seed(TX_ID).await;

        h.service.set_status(TX_ID, "6").await.unwrap();
        h.service
            .handle_notification(&crate::PaymentNotification {
                order_id: Some(format!("ORDER-{TX_ID}-1")),
                transaction_status: Some("expire".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        // cancelled and expired are the same failure payload
        assert_eq!(h.mailer.sent().len(), 1);
    }
}
