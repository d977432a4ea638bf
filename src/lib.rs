//! digestflow - notification digest aggregation
//!
//! Collapses a burst of matched-event notifications for a project into one
//! digest: records grouped by alert rule and issue, issues ranked by recent
//! activity, rules ranked by how many issues they cover.

pub mod config;
pub mod digest_core;
pub mod flush;
pub mod store;

pub use config::DigestConfig;
pub use digest_core::{Digest, DigestBuilder, DigestError, Record, RecordBuilder, RoutingKey};
pub use flush::{flush_key, read_pending_records, FlushError};
pub use store::SqliteStore;
