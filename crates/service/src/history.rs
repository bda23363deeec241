use model::{CookingStatus, Transaction, TransactionStatus};
use repository::{
    EmailLogsRepository, ProductsRepository, TransactionItemsRepository, TransactionsRepository,
};
use tracing::{info, instrument};

use crate::{
    ServiceError, TransactionDetails, TransactionList, TransactionServiceImpl, transaction_lookup,
};

impl<T, I, E, P> TransactionServiceImpl<T, I, E, P>
where
    T: TransactionsRepository,
    I: TransactionItemsRepository,
    E: EmailLogsRepository,
    P: ProductsRepository,
{
    #[instrument(skip(self))]
    pub(crate) async fn history_by_status(
        &self,
        status: &str,
    ) -> Result<TransactionList, ServiceError> {
        let status: TransactionStatus = status
            .parse()
            .map_err(|e| ServiceError::InvalidRequest(format!("{e}")))?;

        let transactions = self.transactions.list_by_status(status).await?;
        let ids: Vec<String> = transactions.iter().map(|t| t.id.clone()).collect();
        let transaction_items = self.items.get_by_transaction_ids(&ids).await?;

        Ok(TransactionList {
            transactions,
            transaction_items,
        })
    }

    pub(crate) async fn details(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionDetails, ServiceError> {
        let (transaction, transaction_items) = tokio::try_join!(
            async {
                self.transactions
                    .get_by_id(transaction_id)
                    .await
                    .map_err(transaction_lookup(transaction_id))
            },
            async {
                self.items
                    .get_by_transaction_id(transaction_id)
                    .await
                    .map_err(ServiceError::from)
            },
        )?;
        Ok(TransactionDetails {
            transaction,
            transaction_items,
        })
    }

    /// The kitchen only works on paid orders, so the cooking status can change
    /// only while the transaction is completed.
    #[instrument(skip(self))]
    pub(crate) async fn change_cooking_status(
        &self,
        transaction_id: &str,
        cooking_status: &str,
    ) -> Result<Transaction, ServiceError> {
        let cooking_status: CookingStatus = cooking_status
            .parse()
            .map_err(|e| ServiceError::InvalidRequest(format!("{e}")))?;

        let transaction = self
            .transactions
            .get_by_id(transaction_id)
            .await
            .map_err(transaction_lookup(transaction_id))?;

        if transaction.status != TransactionStatus::Completed {
            return Err(ServiceError::InvalidRequest(format!(
                "cooking status can only change for completed transactions, this one is {}",
                transaction.status
            )));
        }

        let updated = self
            .transactions
            .update_cooking_status(transaction_id, cooking_status)
            .await
            .map_err(transaction_lookup(transaction_id))?;

        info!(cooking_status = %updated.cooking_status, "Cooking status updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use model::{CookingStatus, TransactionStatus};

    use crate::test_support::{harness, line, transaction};
    use crate::{ServiceError, TransactionService};

    const OLD: &str = "aaaaaaaaaaaaaaaaaaaaaaaa";
    const NEW: &str = "bbbbbbbbbbbbbbbbbbbbbbbb";
    const OTHER: &str = "cccccccccccccccccccccccc";

    #[tokio::test]
    async fn test_list_by_status_newest_first_with_items() {
        let h = harness();
        h.store
            .put_transaction(
                transaction(OLD, TransactionStatus::Completed, 30),
                &[line("Rendang", 1, 35000)],
            )
            .await;
        h.store
            .put_transaction(
                transaction(NEW, TransactionStatus::Completed, 5),
                &[line("Gado-gado", 2, 40000), line("Es Teh", 1, 5000)],
            )
            .await;
        h.store
            .put_transaction(
                transaction(OTHER, TransactionStatus::Pending, 1),
                &[line("Soto", 1, 20000)],
            )
            .await;

        let list = h.service.list_by_status("completed").await.unwrap();
        let ids: Vec<&str> = list.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![NEW, OLD]);
        assert_eq!(list.transaction_items.len(), 3);
        assert!(list.transaction_items.iter().all(|i| i.transaction_id != OTHER));
    }

    #[tokio::test]
    async fn test_list_by_unknown_status() {
        let h = harness();
        let err = h.service.list_by_status("paid").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_cooking_status_requires_completed_transaction() {
        let h = harness();
        h.store
            .put_transaction(transaction(OLD, TransactionStatus::Pending, 0), &[])
            .await;
        h.store
            .put_transaction(transaction(NEW, TransactionStatus::Completed, 0), &[])
            .await;

        let err = h
            .service
            .update_cooking_status(OLD, "Being Cooked")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));

        let updated = h
            .service
            .update_cooking_status(NEW, "Ready to Serve")
            .await
            .unwrap();
        assert_eq!(updated.cooking_status, CookingStatus::ReadyToServe);

        let err = h.service.update_cooking_status(NEW, "Burnt").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        let err = h
            .service
            .update_cooking_status(OTHER, "Completed")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TransactionNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_transaction() {
        let h = harness();
        h.seed(OLD).await;
        let details = h.service.get_transaction(OLD).await.unwrap();
        assert_eq!(details.transaction.id, OLD);
        assert_eq!(details.transaction_items.len(), 2);

        let err = h.service.get_transaction(NEW).await.unwrap_err();
        assert!(matches!(err, ServiceError::TransactionNotFound(_)));
    }
}
