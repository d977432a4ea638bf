//! Digest Flush Runner - builds the digest for one routing key
//!
//! Reads pending records from a JSONL stream, resolves groups and rules from
//! SQLite, ranks them and prints the digest summary as JSON on stdout.
//! Delivery of the digest is left to downstream consumers.
//!
//! ## Usage
//!
//! ```bash
//! DIGEST_KEY="mail:p:1:IssueOwners::" cargo run --release --bin digest_flush
//! ```
//!
//! ## Environment Variables
//!
//! - DIGEST_KEY - Routing key of the batch (required)
//! - DIGEST_DB_PATH - SQLite database path (default: data/digests.db)
//! - DIGEST_SCHEMA_DIR - Schema directory (default: sql)
//! - DIGEST_RECORDS_PATH - Pending records JSONL (default: streams/digests/records.jsonl)
//! - DIGEST_FLUSH_INTERVAL_SECS - Flush interval, 0 = once (default: 0)
//! - RUST_LOG - Logging level (optional, default: info)

use digestflow::digest_core::default_log;
use digestflow::store::run_schema_migrations;
use digestflow::{flush_key, Digest, DigestConfig, SqliteStore};
use tokio::time::{interval, Duration};

fn emit(digest: Option<Digest>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(digest) = digest else {
        log::info!("📭 Nothing to digest");
        return Ok(());
    };

    let summary = digest.summary();
    for rule in digest.rules() {
        log::info!(
            "🎯 Rule {} ({}): {} issues",
            rule.rule.id,
            rule.rule.label,
            rule.len()
        );
        for group in rule.groups() {
            log::info!(
                "   ├─ {} [{} events, {} users, {} records]",
                group.group.title,
                group.event_count,
                group.user_count,
                group.records().len()
            );
        }
    }

    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = DigestConfig::from_env();
    let key = config
        .key
        .clone()
        .ok_or("DIGEST_KEY must be set to the routing key to flush")?;

    log::info!("🚀 Starting Digest Flush Runner");
    log::info!("   Key: {}", key);
    log::info!("   Database: {}", config.db_path);
    log::info!("   Records: {}", config.records_path);

    let store = SqliteStore::open(&config.db_path)?;
    run_schema_migrations(store.connection(), &config.schema_dir)?;

    if config.is_one_shot() {
        let digest = flush_key(&store, &key, &config.records_path, default_log()).await?;
        return emit(digest);
    }

    log::info!("   Flush interval: {}s", config.flush_interval_secs);
    let mut ticker = interval(Duration::from_secs(config.flush_interval_secs));

    loop {
        ticker.tick().await;
        match flush_key(&store, &key, &config.records_path, default_log()).await {
            Ok(digest) => {
                if let Err(e) = emit(digest) {
                    log::error!("Failed to emit digest summary: {}", e);
                }
            }
            // The batch is retried on the next tick
            Err(e) => log::error!("Digest flush failed: {}", e),
        }
    }
}
