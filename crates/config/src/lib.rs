use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// `AppConfig` holds all configuration parameters required by the application.
///
/// Values come from environment variables (optionally via a `.env` file) and fall
/// back to defaults suitable for a local run. Nested keys are not used, so every
/// field maps to one upper-case variable, e.g. `DB_HOST` or `MIDTRANS_SERVER_KEY`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Database settings ---
    /// Database hostname or service name.
    pub db_host: String,
    /// Database port (default: 5432).
    pub db_port: u16,
    /// Database user.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Database name.
    pub db_name: String,
    /// Maximum number of pooled connections.
    pub db_pool_size: usize,
    /// Directory holding `.sql` migrations, applied in file-name order.
    pub migrations_dir: String,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,

    // --- Shutdown timeout ---
    /// Graceful shutdown timeout (human-friendly format, e.g. "5s", "1m").
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub shutdown_timeout: Duration,

    // --- Logging ---
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,

    // --- Mail ---
    /// Endpoint of the transactional mail API. Empty means emails are only logged.
    pub mail_api_url: String,
    /// Bearer key for the mail API.
    pub mail_api_key: String,
    /// Sender address used on notification emails.
    pub mail_from: String,

    // --- Payment gateway ---
    /// Midtrans server key, used for Snap requests and notification signatures.
    pub midtrans_server_key: String,
    /// Snap transaction endpoint.
    pub midtrans_snap_url: String,
    /// Reject notifications whose `signature_key` does not match.
    pub midtrans_verify_signature: bool,
    /// Prefix of the composite order id sent to the gateway.
    pub order_id_prefix: String,
}

/// Custom deserializer for graceful shutdown timeout.
/// Accepts human-readable formats like "5s", "1m", etc.
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from `.env` file).
    ///
    /// Fields not set via env will be filled with default values.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid or missing required values.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env(config::Environment::default())
    }

    /// Builds the configuration from defaults overlaid by the given environment source.
    pub fn from_env(env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "resto_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "resto_db")?
            .set_default("db_pool_size", 16)?
            .set_default("migrations_dir", "migrations")?
            // HTTP
            .set_default("http_port", 8081)?
            // Shutdown
            .set_default("shutdown_timeout", "5s")?
            // Logging
            .set_default("log_level", "info")?
            // Mail
            .set_default("mail_api_url", "")?
            .set_default("mail_api_key", "")?
            .set_default("mail_from", "Resto <no-reply@resto.local>")?
            // Payment gateway
            .set_default("midtrans_server_key", "")?
            .set_default(
                "midtrans_snap_url",
                "https://app.sandbox.midtrans.com/snap/v1/transactions",
            )?
            .set_default("midtrans_verify_signature", false)?
            .set_default("order_id_prefix", "ORDER")?
            .add_source(env.separator("__").try_parsing(true))
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// Key/value DSN understood by `tokio_postgres::Config`.
    pub fn db_dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode=disable",
            self.db_host, self.db_port, self.db_user, self.db_password, self.db_name
        )
    }
}
