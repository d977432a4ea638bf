//! Digest Core - notification digest aggregation
//!
//! Turns a burst of matched-event records for one project into a single
//! ranked digest instead of one notification per event.
//!
//! # Architecture
//!
//! ```text
//! Event + matched Rules → RecordBuilder → Record (JSONL stream)
//!     ↓
//! routing key → split_key → Project
//!     ↓
//! DigestBuilder (GroupRepository, RuleRepository, CountingService)
//!     ↓
//! Digest: Rule → Group → [DigestRecord]
//! ```

pub mod builder;
pub mod digest;
pub mod key;
pub mod log;
pub mod memory;
pub mod models;
pub mod record;
pub mod repository;

pub use builder::{DigestBuilder, DigestError, DigestWarnings};
pub use digest::{Digest, DigestSummary, GroupDigest, RuleDigest};
pub use key::{split_key, unsplit_key, ActionTargetType, FallthroughChoice, KeyError, RoutingKey};
pub use log::{default_log, DigestLog, LogFacade};
pub use memory::MemoryStore;
pub use models::{Group, GroupId, GroupStatus, Project, ProjectId, Rule, RuleId, TenantIds};
pub use record::{DigestRecord, Event, Notification, Record, RecordBuilder};
pub use repository::{
    CountingError, CountingService, GroupRepository, ProjectRepository, RepositoryError,
    RuleRepository, TsdbModel,
};
