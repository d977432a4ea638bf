//! Flush runner configuration from environment variables

use std::env;

/// Configuration for the digest flush runner
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory of schema files applied at startup
    pub schema_dir: String,

    /// JSONL file of pending digest records
    pub records_path: String,

    /// Routing key of the batch to flush
    pub key: Option<String>,

    /// Seconds between flushes; 0 flushes once and exits
    pub flush_interval_secs: u64,
}

impl DigestConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DIGEST_DB_PATH` (default: data/digests.db)
    /// - `DIGEST_SCHEMA_DIR` (default: sql)
    /// - `DIGEST_RECORDS_PATH` (default: streams/digests/records.jsonl)
    /// - `DIGEST_KEY` (no default)
    /// - `DIGEST_FLUSH_INTERVAL_SECS` (default: 0)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("DIGEST_DB_PATH").unwrap_or_else(|_| "data/digests.db".to_string()),

            schema_dir: env::var("DIGEST_SCHEMA_DIR").unwrap_or_else(|_| "sql".to_string()),

            records_path: env::var("DIGEST_RECORDS_PATH")
                .unwrap_or_else(|_| "streams/digests/records.jsonl".to_string()),

            key: env::var("DIGEST_KEY").ok().filter(|k| !k.is_empty()),

            flush_interval_secs: env::var("DIGEST_FLUSH_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }

    pub fn is_one_shot(&self) -> bool {
        self.flush_interval_secs == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share process-wide env vars, so they run in one test.
    #[test]
    fn test_config_from_env() {
        for var in [
            "DIGEST_DB_PATH",
            "DIGEST_SCHEMA_DIR",
            "DIGEST_RECORDS_PATH",
            "DIGEST_KEY",
            "DIGEST_FLUSH_INTERVAL_SECS",
        ] {
            env::remove_var(var);
        }

        let config = DigestConfig::from_env();
        assert_eq!(config.db_path, "data/digests.db");
        assert_eq!(config.schema_dir, "sql");
        assert_eq!(config.records_path, "streams/digests/records.jsonl");
        assert_eq!(config.key, None);
        assert_eq!(config.flush_interval_secs, 0);
        assert!(config.is_one_shot());

        env::set_var("DIGEST_DB_PATH", "/tmp/test.db");
        env::set_var("DIGEST_KEY", "mail:p:1:IssueOwners::");
        env::set_var("DIGEST_FLUSH_INTERVAL_SECS", "30");

        let config = DigestConfig::from_env();
        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.key.as_deref(), Some("mail:p:1:IssueOwners::"));
        assert_eq!(config.flush_interval_secs, 30);
        assert!(!config.is_one_shot());

        env::set_var("DIGEST_FLUSH_INTERVAL_SECS", "soon");
        assert_eq!(DigestConfig::from_env().flush_interval_secs, 0);

        env::remove_var("DIGEST_DB_PATH");
        env::remove_var("DIGEST_KEY");
        env::remove_var("DIGEST_FLUSH_INTERVAL_SECS");
    }
}
