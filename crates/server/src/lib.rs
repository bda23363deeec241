//! Server crate provides HTTP server functionality.
//!
//! This module implements the HTTP API of the restaurant backend: the payment
//! gateway webhook, the operator status override, checkout, the transaction
//! history used by the kitchen, health and Prometheus metrics.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, patch, post, put},
};
use service::TransactionService;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod error;
mod handlers;
mod metrics;

pub use error::{ApiError, ApiResponse};
pub use metrics::Metrics;

/// Server represents the HTTP server of the restaurant backend.
pub struct Server {
    service: Arc<dyn TransactionService>,
    port: u16,
    metrics: Arc<Metrics>,
    shutdown_timeout: Duration,
}

/// Application state shared between request handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) service: Arc<dyn TransactionService>,
    pub(crate) metrics: Arc<Metrics>,
}

impl Server {
    /// Creates a new Server instance.
    ///
    /// # Arguments
    ///
    /// * `port` - The port on which the server will listen
    /// * `service` - Business operations behind the routes
    /// * `shutdown_timeout` - How long in-flight requests may run after a shutdown signal
    pub fn new(
        port: u16,
        service: Arc<dyn TransactionService>,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        info!("Initializing HTTP server on port {}", port);
        let metrics = Metrics::new().context("Failed to create metrics registry")?;

        Ok(Self {
            service,
            port,
            metrics: Arc::new(metrics),
            shutdown_timeout,
        })
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        let mut graceful_rx = shutdown_rx.clone();
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = graceful_rx.wait_for(|stop| *stop).await;
        });

        let mut deadline_rx = shutdown_rx;
        let timeout = self.shutdown_timeout;
        tokio::select! {
            res = serve.into_future() => {
                res.context("Server error")?;
                info!("HTTP server shut down gracefully");
            }
            _ = async move {
                let _ = deadline_rx.wait_for(|stop| *stop).await;
                tokio::time::sleep(timeout).await;
            } => {
                warn!(?timeout, "Shutdown timeout elapsed, dropping in-flight requests");
            }
        }

        Ok(())
    }

    /// The route table with metrics and request tracing applied.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route(
                "/api/payment/notification",
                post(handlers::payment_notification),
            )
            .route(
                "/api/transactions/{transaction_id}/status/{status}",
                put(handlers::set_transaction_status),
            )
            .route(
                "/api/transactions",
                post(handlers::checkout).get(handlers::list_transactions),
            )
            .route(
                "/api/transactions/{transaction_id}",
                get(handlers::get_transaction),
            )
            .route(
                "/api/transactions/{transaction_id}/cooking-status",
                patch(handlers::update_cooking_status),
            )
            .route("/api/products", get(handlers::list_products))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .layer(axum::middleware::from_fn_with_state(
                self.metrics.clone(),
                metrics::track,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
