use std::collections::HashMap;
use std::time::Duration;

use app_config::AppConfig;

fn env_from(pairs: &[(&str, &str)]) -> config::Environment {
    let source: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    config::Environment::default().source(Some(source))
}

#[test]
fn test_load_default_config() {
    let cfg = AppConfig::from_env(env_from(&[])).unwrap();
    assert_eq!(cfg.db_host, "localhost");
    assert_eq!(cfg.db_port, 5432);
    assert_eq!(cfg.http_port, 8081);
    assert_eq!(cfg.shutdown_timeout, Duration::from_secs(5));
    assert_eq!(cfg.order_id_prefix, "ORDER");
    assert!(!cfg.midtrans_verify_signature);
    assert!(cfg.mail_api_url.is_empty());
}

#[test]
fn test_env_overrides_defaults() {
    let cfg = AppConfig::from_env(env_from(&[
        ("DB_HOST", "postgres"),
        ("HTTP_PORT", "9000"),
        ("SHUTDOWN_TIMEOUT", "1m"),
        ("MIDTRANS_VERIFY_SIGNATURE", "true"),
        ("MAIL_API_URL", "https://mail.example.com/send"),
    ]))
    .unwrap();

    assert_eq!(cfg.db_host, "postgres");
    assert_eq!(cfg.http_port, 9000);
    assert_eq!(cfg.shutdown_timeout, Duration::from_secs(60));
    assert!(cfg.midtrans_verify_signature);
    assert_eq!(cfg.mail_api_url, "https://mail.example.com/send");
    assert_eq!(
        cfg.db_dsn(),
        "host=postgres port=5432 user=resto_user password=securepassword dbname=resto_db sslmode=disable"
    );
}

#[test]
fn test_invalid_duration_is_rejected() {
    let result = AppConfig::from_env(env_from(&[("SHUTDOWN_TIMEOUT", "soon")]));
    assert!(result.is_err());
}
