//! Reconciliation of payment gateway notifications with stored transactions.

use model::{OrderReference, PaymentStatus, canonical_id};
use repository::{
    EmailLogsRepository, ProductsRepository, TransactionItemsRepository, TransactionsRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{ServiceError, TransactionDetails, TransactionServiceImpl, transaction_lookup};

/// Body of a payment notification. Only `order_id` and `transaction_status`
/// drive reconciliation; the remaining fields feed the signature check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub transaction_status: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
    #[serde(default)]
    pub signature_key: Option<String>,
}

impl<T, I, E, P> TransactionServiceImpl<T, I, E, P>
where
    T: TransactionsRepository,
    I: TransactionItemsRepository,
    E: EmailLogsRepository,
    P: ProductsRepository,
{
    #[instrument(skip(self, notification), fields(order_id = ?notification.order_id, gateway_status = ?notification.transaction_status))]
    pub(crate) async fn reconcile(
        &self,
        notification: &PaymentNotification,
    ) -> Result<TransactionDetails, ServiceError> {
        let order_id = notification
            .order_id
            .as_deref()
            .ok_or_else(|| ServiceError::InvalidReference("missing order_id".to_string()))?;

        let reference = OrderReference::parse(order_id)
            .map_err(|e| ServiceError::InvalidReference(e.to_string()))?;

        if self.settings.verify_signature {
            self.check_signature(order_id, notification)?;
        }

        let id = canonical_id(&reference.transaction_id);
        let transaction_id = id.as_str();

        let (transaction, items) = tokio::try_join!(
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

        if items.is_empty() {
            return Err(ServiceError::ItemsNotFound(transaction_id.to_string()));
        }

        let gateway_status =
            PaymentStatus::parse(notification.transaction_status.as_deref().unwrap_or_default());
        let status = gateway_status.to_transaction_status();

        let updated = self
            .transactions
            .update_status(&transaction.id, status)
            .await
            .map_err(transaction_lookup(transaction_id))?;

        info!(
            transaction_id,
            previous_status = %transaction.status,
            status = %status,
            email_payload = ?status.email_payload(),
            "Transaction status updated from payment notification"
        );

        self.guard.notify(&updated, &items).await;

        Ok(TransactionDetails {
            transaction: updated,
            transaction_items: items,
        })
    }

    fn check_signature(
        &self,
        order_id: &str,
        notification: &PaymentNotification,
    ) -> Result<(), ServiceError> {
        let valid = match (
            notification.status_code.as_deref(),
            notification.gross_amount.as_deref(),
            notification.signature_key.as_deref(),
        ) {
            (Some(status_code), Some(gross_amount), Some(signature_key)) => gateway::verify_signature(
                order_id,
                status_code,
                gross_amount,
                &self.settings.server_key,
                signature_key,
            ),
            _ => false,
        };

        if !valid {
            warn!(order_id, "Rejected payment notification with invalid signature");
            return Err(ServiceError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use model::{EmailPayload, TransactionStatus};

    use crate::test_support::{TX_ID, harness, harness_with, line, transaction};
    use crate::{PaymentNotification, ServiceError, ServiceSettings, TransactionService};

    fn notification(order_id: &str, status: &str) -> PaymentNotification {
        PaymentNotification {
            order_id: Some(order_id.to_string()),
            transaction_status: Some(status.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_settlement_completes_and_sends_success_once() {
        let h = harness();
        h.seed("64a1f9").await;

        let details = h
            .service
            .handle_notification(&notification("order-64a1f9-1699999999", "settlement"))
            .await
            .unwrap();

        assert_eq!(details.transaction.status, TransactionStatus::Completed);
        assert_eq!(details.transaction_items.len(), 2);
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, EmailPayload::Success);
        assert_eq!(sent[0].recipient, "rina@example.com");
        assert_eq!(sent[0].item_count, 2);
        assert_eq!(h.store.email_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_sends_no_additional_email() {
        let h = harness();
        h.seed(TX_ID).await;
        let order_id = format!("ORDER-{TX_ID}-1700000000");

        for _ in 0..3 {
            h.service
                .handle_notification(&notification(&order_id, "capture"))
                .await
                .unwrap();
        }

        assert_eq!(h.mailer.sent().len(), 1);
        assert_eq!(h.store.email_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_every_gateway_status_is_persisted() {
        let cases = [
            ("settlement", TransactionStatus::Completed, Some(EmailPayload::Success)),
            ("capture", TransactionStatus::Completed, Some(EmailPayload::Success)),
            ("pending", TransactionStatus::Pending, None),
            ("cancel", TransactionStatus::Cancelled, Some(EmailPayload::Failure)),
            ("refund", TransactionStatus::Cancelled, Some(EmailPayload::Failure)),
            ("expire", TransactionStatus::Expired, Some(EmailPayload::Failure)),
            ("deny", TransactionStatus::Denied, Some(EmailPayload::Failure)),
            ("challenge", TransactionStatus::ChallengedByFraudCheck, None),
            ("authorize", TransactionStatus::Pending, None),
        ];

        for (code, expected, payload) in cases {
            let h = harness();
            h.seed(TX_ID).await;
            let details = h
                .service
                .handle_notification(&notification(&format!("ORDER-{TX_ID}"), code))
                .await
                .unwrap();

            assert_eq!(details.transaction.status, expected, "{code}");
            assert_eq!(h.store.transaction(TX_ID).await.unwrap().status, expected, "{code}");
            let sent: Vec<_> = h.mailer.sent().into_iter().map(|s| s.payload).collect();
            assert_eq!(sent, payload.into_iter().collect::<Vec<_>>(), "{code}");
        }
    }

    #[tokio::test]
    async fn test_missing_status_falls_back_to_pending() {
        let h = harness();
        h.store
            .put_transaction(
                transaction(TX_ID, TransactionStatus::Completed, 0),
                &[line("Bakso", 1, 20000)],
            )
            .await;

        let details = h
            .service
            .handle_notification(&PaymentNotification {
                order_id: Some(format!("ORDER-{TX_ID}")),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(details.transaction.status, TransactionStatus::Pending);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reference_without_separator_is_rejected_without_writes() {
        let h = harness();
        h.seed(TX_ID).await;

        for order_id in [TX_ID, "", "ORDER-"] {
            let err = h
                .service
                .handle_notification(&notification(order_id, "settlement"))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidReference(_)), "{order_id}");
        }
        let err = h
            .service
            .handle_notification(&PaymentNotification::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidReference(_)));

        assert_eq!(h.store.transaction(TX_ID).await.unwrap().status, TransactionStatus::Pending);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_not_found() {
        let h = harness();
        let err = h
            .service
            .handle_notification(&notification("ORDER-ffffffffffffffffffffffff-1", "settlement"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TransactionNotFound(id) if id == "ffffffffffffffffffffffff"));
    }

    #[tokio::test]
    async fn test_transaction_without_items_is_not_found() {
        let h = harness();
        h.store
            .put_transaction(transaction(TX_ID, TransactionStatus::Pending, 0), &[])
            .await;

        let err = h
            .service
            .handle_notification(&notification(&format!("ORDER-{TX_ID}"), "settlement"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ItemsNotFound(_)));
        assert_eq!(h.store.transaction(TX_ID).await.unwrap().status, TransactionStatus::Pending);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_does_not_fail_notification() {
        let h = harness();
        h.seed(TX_ID).await;
        h.mailer.set_failing(true);

        let details = h
            .service
            .handle_notification(&notification(&format!("ORDER-{TX_ID}"), "deny"))
            .await
            .unwrap();
        assert_eq!(details.transaction.status, TransactionStatus::Denied);
        assert!(h.store.email_logs().await.is_empty());

        h.mailer.set_failing(false);
        h.service
            .handle_notification(&notification(&format!("ORDER-{TX_ID}"), "deny"))
            .await
            .unwrap();
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_uppercase_reference_id_finds_stored_transaction() {
        let h = harness();
        h.seed(TX_ID).await;
        let order_id = format!("ORDER-{}-1700000000", TX_ID.to_ascii_uppercase());

        let details = h
            .service
            .handle_notification(&notification(&order_id, "settlement"))
            .await
            .unwrap();

        assert_eq!(details.transaction.id, TX_ID);
        assert_eq!(
            h.store.transaction(TX_ID).await.unwrap().status,
            TransactionStatus::Completed
        );
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_reference_is_rejected_before_signature() {
        let h = harness_with(ServiceSettings {
            server_key: "SB-server-key".to_string(),
            verify_signature: true,
            ..Default::default()
        });
        h.seed(TX_ID).await;

        let err = h
            .service
            .handle_notification(&notification(TX_ID, "settlement"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_signature_is_checked_when_enabled() {
        let h = harness_with(ServiceSettings {
            server_key: "SB-server-key".to_string(),
            verify_signature: true,
            ..Default::default()
        });
        h.seed(TX_ID).await;
        let order_id = format!("ORDER-{TX_ID}-1700000000");

        let mut forged = notification(&order_id, "settlement");
        forged.status_code = Some("200".to_string());
        forged.gross_amount = Some("40000.00".to_string());
        forged.signature_key = Some("00".repeat(64));
        let err = h.service.handle_notification(&forged).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature));
        assert_eq!(h.store.transaction(TX_ID).await.unwrap().status, TransactionStatus::Pending);

        let mut signed = forged.clone();
        signed.signature_key = Some(gateway::notification_signature(
            &order_id,
            "200",
            "40000.00",
            "SB-server-key",
        ));
        let details = h.service.handle_notification(&signed).await.unwrap();
        assert_eq!(details.transaction.status, TransactionStatus::Completed);
    }
}
