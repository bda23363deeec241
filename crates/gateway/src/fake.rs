use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::{GatewayError, PaymentGateway, PaymentRequest, PaymentSession};

/// Gateway that opens every payment locally and keeps the requests it saw.
#[derive(Debug, Default)]
pub struct StaticGateway {
    requests: Mutex<Vec<PaymentRequest>>,
    failing: AtomicBool,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentSession, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        Ok(PaymentSession {
            token: format!("token-{}", request.order_id),
            redirect_url: format!("https://pay.test/{}", request.order_id),
        })
    }
}
