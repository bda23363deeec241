//! Runs against a real PostgreSQL. Ignored by default; run with
//! `TEST_DATABASE_URL=postgres://... cargo test -p repository -- --ignored`.

use chrono::Utc;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use model::{EmailLog, EmailPayload};
use repository::{EmailLogsRepository, PgEmailLogsRepository};
use tokio_postgres::NoTls;

const SCHEMA: &str = include_str!("../../../migrations/002_email_logs.sql");

async fn pool() -> Option<Pool> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        println!("Skipping PostgreSQL test - no TEST_DATABASE_URL provided");
        return None;
    };
    let config: tokio_postgres::Config = url.parse().unwrap();
    let manager = Manager::from_config(
        config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(manager)
        .max_size(4)
        .runtime(Runtime::Tokio1)
        .build()
        .unwrap();
    pool.get().await.unwrap().batch_execute(SCHEMA).await.unwrap();
    Some(pool)
}

fn log(transaction_id: &str) -> EmailLog {
    EmailLog {
        transaction_id: transaction_id.to_string(),
        customer_email: "rina@example.com".to_string(),
        payload: EmailPayload::Success,
        created_at: Utc::now(),
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_concurrent_claims_insert_one_row() {
    let Some(pool) = pool().await else {
        return;
    };
    let repo = PgEmailLogsRepository::new(pool);
    let transaction_id = format!("{:024x}", Utc::now().timestamp_micros());
    let entry = log(&transaction_id);

    let (a, b) = tokio::join!(repo.try_claim(&entry), repo.try_claim(&entry));
    let won = [a.unwrap(), b.unwrap()];
    assert_eq!(won.iter().filter(|claimed| **claimed).count(), 1);
    assert!(repo.exists(&transaction_id, EmailPayload::Success).await.unwrap());
    assert!(!repo.exists(&transaction_id, EmailPayload::Failure).await.unwrap());

    repo.release(&transaction_id, EmailPayload::Success).await.unwrap();
    assert!(!repo.exists(&transaction_id, EmailPayload::Success).await.unwrap());
    assert!(repo.try_claim(&entry).await.unwrap());

    repo.release(&transaction_id, EmailPayload::Success).await.unwrap();
}
