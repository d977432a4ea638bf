//! Digest builder - groups a batch of records by rule and issue, then ranks
//!
//! # Pipeline
//!
//! ```text
//! records (newest first)
//!     ↓
//! bulk resolve groups + rules (one lookup each)
//!     ↓
//! windowed event / user counts (one query each)
//!     ↓
//! grouping pass: rule → group → records
//!     ↓
//! rank groups by (events, users), rank rules by group count
//! ```

use super::digest::{Digest, GroupDigest, RuleDigest};
use super::log::DigestLog;
use super::models::{Group, GroupId, Project, ProjectId, Rule, RuleId};
use super::record::{datetime_from_timestamp, DigestRecord, Record};
use super::repository::{
    CountingError, CountingService, GroupRepository, RepositoryError, RuleRepository, TsdbModel,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("lookup failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("counting failed: {0}")]
    Counting(#[from] CountingError),

    #[error("{entity} {id} belongs to project {found}, expected project {expected}")]
    ProjectMismatch {
        entity: &'static str,
        id: i64,
        found: ProjectId,
        expected: ProjectId,
    },

    #[error("no {model:?} count returned for group {group_id}")]
    MissingCount { group_id: GroupId, model: TsdbModel },

    #[error("record timestamp {0} is not a valid instant")]
    InvalidTimestamp(f64),
}

/// Non-fatal diagnostics that travel with a digest. Nothing fills this yet.
pub type DigestWarnings = Vec<String>;

pub struct DigestBuilder<'a> {
    groups: &'a dyn GroupRepository,
    rules: &'a dyn RuleRepository,
    counts: &'a dyn CountingService,
    log: Arc<dyn DigestLog>,
}

impl<'a> DigestBuilder<'a> {
    pub fn new(
        groups: &'a dyn GroupRepository,
        rules: &'a dyn RuleRepository,
        counts: &'a dyn CountingService,
        log: Arc<dyn DigestLog>,
    ) -> Self {
        Self {
            groups,
            rules,
            counts,
            log,
        }
    }

    /// Use one backend for every collaborator
    pub fn from_store<S>(store: &'a S, log: Arc<dyn DigestLog>) -> Self
    where
        S: GroupRepository + RuleRepository + CountingService,
    {
        Self::new(store, store, store, log)
    }

    /// Build the digest for one project batch
    ///
    /// `records` must be newest first: the window handed to the counting
    /// backend is `[last.timestamp, first.timestamp]`. An empty batch yields
    /// `None` rather than an empty digest.
    pub fn build(
        &self,
        project: &Project,
        records: &[Record],
    ) -> Result<(Option<Digest>, DigestWarnings), DigestError> {
        let (first, last) = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Ok((None, Vec::new())),
        };
        let start = to_datetime(last.timestamp)?;
        let end = to_datetime(first.timestamp)?;

        let groups = self.resolve_groups(project, records)?;
        let rules = self.resolve_rules(project, records)?;

        let group_ids: Vec<GroupId> = unique(records.iter().filter_map(Record::group_id))
            .into_iter()
            .filter(|id| groups.contains_key(id))
            .collect();
        let tenant_ids = project.tenant_ids();
        let event_counts =
            self.counts
                .get_sums(TsdbModel::Group, &group_ids, start, end, &tenant_ids)?;
        let user_counts = self.counts.get_distinct_counts_totals(
            TsdbModel::UsersAffectedByGroup,
            &group_ids,
            start,
            end,
            &tenant_ids,
        )?;

        let mut grouped: IndexMap<RuleId, RuleDigest> = IndexMap::new();
        for record in records {
            let group = match record.group_id().and_then(|id| groups.get(&id)) {
                Some(group) => group,
                None => {
                    self.log
                        .debug(format_args!("{} could not be associated with a group.", record));
                    continue;
                }
            };

            if !group.is_unresolved() {
                self.log.debug(format_args!(
                    "{} skipped, group {} is {}.",
                    record,
                    group.id,
                    group.status.as_str()
                ));
                continue;
            }

            let record_rules: Vec<&Rule> = record
                .value
                .rules
                .iter()
                .filter_map(|id| rules.get(id))
                .collect();
            if record_rules.is_empty() {
                self.log.debug(format_args!(
                    "{} has no associated rules, and will not be added to any groups.",
                    record
                ));
                continue;
            }

            let event_count = count_for(&event_counts, group.id, TsdbModel::Group)?;
            let user_count = count_for(&user_counts, group.id, TsdbModel::UsersAffectedByGroup)?;
            let entry = DigestRecord {
                record: record.clone(),
                group: group.clone(),
            };

            for rule in record_rules {
                grouped
                    .entry(rule.id)
                    .or_insert_with(|| RuleDigest {
                        rule: rule.clone(),
                        groups: IndexMap::new(),
                    })
                    .groups
                    .entry(group.id)
                    .or_insert_with(|| GroupDigest {
                        group: group.clone(),
                        event_count,
                        user_count,
                        records: Vec::new(),
                    })
                    .records
                    .push(entry.clone());
            }
        }

        // Both sorts are stable, so ties keep first-seen order.
        for rule in grouped.values_mut() {
            rule.groups.sort_by(|_, a, _, b| {
                (b.event_count, b.user_count).cmp(&(a.event_count, a.user_count))
            });
        }
        grouped.sort_by(|_, a, _, b| b.groups.len().cmp(&a.groups.len()));

        Ok((Some(Digest { rules: grouped }), Vec::new()))
    }

    fn resolve_groups(
        &self,
        project: &Project,
        records: &[Record],
    ) -> Result<HashMap<GroupId, Arc<Group>>, DigestError> {
        let ids = unique(records.iter().filter_map(Record::group_id));
        let groups = self.groups.in_bulk(&ids)?;

        for group in groups.values() {
            if group.project_id != project.id {
                return Err(DigestError::ProjectMismatch {
                    entity: "group",
                    id: group.id,
                    found: group.project_id,
                    expected: project.id,
                });
            }
        }

        Ok(groups
            .into_iter()
            .map(|(id, group)| (id, Arc::new(group)))
            .collect())
    }

    fn resolve_rules(
        &self,
        project: &Project,
        records: &[Record],
    ) -> Result<HashMap<RuleId, Rule>, DigestError> {
        let ids = unique(
            records
                .iter()
                .flat_map(|record| record.value.rules.iter().copied()),
        );
        let rules = self.rules.in_bulk(&ids)?;

        for rule in rules.values() {
            if rule.project_id != project.id {
                return Err(DigestError::ProjectMismatch {
                    entity: "rule",
                    id: rule.id,
                    found: rule.project_id,
                    expected: project.id,
                });
            }
        }

        Ok(rules)
    }
}

fn to_datetime(timestamp: f64) -> Result<DateTime<Utc>, DigestError> {
    datetime_from_timestamp(timestamp).ok_or(DigestError::InvalidTimestamp(timestamp))
}

fn count_for(
    counts: &HashMap<GroupId, u64>,
    group_id: GroupId,
    model: TsdbModel,
) -> Result<u64, DigestError> {
    counts
        .get(&group_id)
        .copied()
        .ok_or(DigestError::MissingCount { group_id, model })
}

/// Distinct ids in first-seen order
fn unique(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
