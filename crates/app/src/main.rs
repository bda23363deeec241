/// Restaurant Payments Backend
///
/// Entry point of the restaurant ordering backend. The service opens payments
/// for table orders, reconciles payment gateway notifications with stored
/// transactions and emails customers once per payment outcome.
///
/// # Architecture
///
/// - Repository layer for data access (PostgreSQL)
/// - Service layer for business logic
/// - Mailer and payment gateway clients
/// - API layer for HTTP endpoints with Prometheus metrics
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use app_config::AppConfig;
use gateway::MidtransSnap;
use mailer::{HttpMailer, LogMailer, Mailer};
use repository::{
    PgEmailLogsRepository, PgProductsRepository, PgTransactionItemsRepository,
    PgTransactionsRepository,
};
use server::Server;
use service::{ServiceSettings, TransactionServiceImpl};

/// Initialize the tracing subscriber; `RUST_LOG` overrides the configured level.
fn init_logger(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {e}"))
}

fn build_mailer(config: &AppConfig) -> Arc<dyn Mailer> {
    if config.mail_api_url.is_empty() {
        info!("No mail API configured, notification emails will only be logged");
        Arc::new(LogMailer::new())
    } else {
        Arc::new(HttpMailer::new(
            config.mail_api_url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    if let Err(err) = init_logger(&config.log_level) {
        eprintln!("{err:#}");
        return Err(err);
    }

    info!("Restaurant payments backend starting...");

    let db_pool = match db::init_db_pool(&config).await {
        Ok(pool) => {
            info!("Database initialized successfully");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {:#}", e);
            return Err(e.context("Failed to initialize database"));
        }
    };

    if config.midtrans_server_key.is_empty() {
        warn!("MIDTRANS_SERVER_KEY is empty, checkout requests will be rejected by the gateway");
    }

    let transaction_service = TransactionServiceImpl::new(
        PgTransactionsRepository::new(db_pool.clone()),
        PgTransactionItemsRepository::new(db_pool.clone()),
        PgEmailLogsRepository::new(db_pool.clone()),
        PgProductsRepository::new(db_pool),
        build_mailer(&config),
        Arc::new(MidtransSnap::new(
            config.midtrans_snap_url.clone(),
            config.midtrans_server_key.clone(),
        )),
        ServiceSettings {
            order_id_prefix: config.order_id_prefix.clone(),
            server_key: config.midtrans_server_key.clone(),
            verify_signature: config.midtrans_verify_signature,
        },
    );

    let http_server = Server::new(
        config.http_port,
        Arc::new(transaction_service),
        config.shutdown_timeout,
    )?;

    if let Err(err) = http_server.start().await {
        error!("HTTP server error: {:#}", err);
        return Err(err);
    }

    info!("Application stopped");
    Ok(())
}
