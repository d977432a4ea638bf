//! Collaborator traits for the digest engine
//!
//! Lookups are bulk by design: the builder resolves every group and every
//! rule of a batch with one call each, and asks the counting backend once
//! per metric for the whole group set.

use super::models::{Group, GroupId, Project, ProjectId, Rule, RuleId, TenantIds};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CountingError {
    #[error("counting backend unavailable: {0}")]
    Unavailable(String),

    #[error("counting query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Series the counting backend keeps per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TsdbModel {
    /// Events seen per group
    Group,
    /// Distinct users affected per group
    UsersAffectedByGroup,
}

pub trait ProjectRepository {
    fn get(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError>;
}

pub trait GroupRepository {
    /// Ids with no matching group are absent from the result
    fn in_bulk(&self, ids: &[GroupId]) -> Result<HashMap<GroupId, Group>, RepositoryError>;
}

pub trait RuleRepository {
    /// Ids with no matching rule are absent from the result
    fn in_bulk(&self, ids: &[RuleId]) -> Result<HashMap<RuleId, Rule>, RepositoryError>;
}

/// Windowed counters over group activity
///
/// Both calls must return an entry for every requested id, zero when the
/// backend has nothing recorded for it.
pub trait CountingService {
    fn get_sums(
        &self,
        model: TsdbModel,
        keys: &[GroupId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tenant_ids: &TenantIds,
    ) -> Result<HashMap<GroupId, u64>, CountingError>;

    fn get_distinct_counts_totals(
        &self,
        model: TsdbModel,
        keys: &[GroupId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tenant_ids: &TenantIds,
    ) -> Result<HashMap<GroupId, u64>, CountingError>;
}
