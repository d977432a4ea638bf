//! Ranked digest output
//!
//! Rules are ordered by how many groups they cover, groups within a rule by
//! `(event_count, user_count)`, both descending. Everything here is a
//! read-only view assembled by the builder.

use super::models::{Group, GroupId, Rule, RuleId};
use super::record::{datetime_from_timestamp, DigestRecord};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct GroupDigest {
    pub group: Arc<Group>,
    pub event_count: u64,
    pub user_count: u64,
    pub(crate) records: Vec<DigestRecord>,
}

impl GroupDigest {
    /// Records in batch order (newest first)
    pub fn records(&self) -> &[DigestRecord] {
        &self.records
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleDigest {
    pub rule: Rule,
    pub(crate) groups: IndexMap<GroupId, GroupDigest>,
}

impl RuleDigest {
    pub fn groups(&self) -> impl Iterator<Item = &GroupDigest> {
        self.groups.values()
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupDigest> {
        self.groups.get(&id)
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Digest {
    pub(crate) rules: IndexMap<RuleId, RuleDigest>,
}

impl Digest {
    pub fn rules(&self) -> impl Iterator<Item = &RuleDigest> {
        self.rules.values()
    }

    pub fn get(&self, id: RuleId) -> Option<&RuleDigest> {
        self.rules.get(&id)
    }

    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.rules.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Time span and per-group record counts
    ///
    /// A record filed under several rules is counted once for its group.
    pub fn summary(&self) -> DigestSummary {
        let mut seen: HashSet<(GroupId, &str)> = HashSet::new();
        let mut counts: BTreeMap<GroupId, usize> = BTreeMap::new();
        let mut groups: HashSet<GroupId> = HashSet::new();
        let mut earliest: Option<f64> = None;
        let mut latest: Option<f64> = None;

        for rule in self.rules.values() {
            for (group_id, group) in &rule.groups {
                groups.insert(*group_id);
                for entry in &group.records {
                    if !seen.insert((*group_id, entry.record.key.as_str())) {
                        continue;
                    }
                    *counts.entry(*group_id).or_insert(0) += 1;

                    let ts = entry.record.timestamp;
                    earliest = Some(earliest.map_or(ts, |e| e.min(ts)));
                    latest = Some(latest.map_or(ts, |l| l.max(ts)));
                }
            }
        }

        DigestSummary {
            start: earliest.and_then(datetime_from_timestamp),
            end: latest.and_then(datetime_from_timestamp),
            rule_count: self.rules.len(),
            group_count: groups.len(),
            record_count: counts.values().sum(),
            counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestSummary {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub rule_count: usize,
    pub group_count: usize,
    pub record_count: usize,
    pub counts: BTreeMap<GroupId, usize>,
}
