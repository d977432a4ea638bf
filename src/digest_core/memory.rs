//! In-memory repositories and counting service
//!
//! Backs tests and embedders that already hold entities in memory. Every
//! lookup and count query is recorded so callers can check batching.

use super::models::{Group, GroupId, Project, ProjectId, Rule, RuleId, TenantIds};
use super::repository::{
    CountingError, CountingService, GroupRepository, ProjectRepository, RepositoryError,
    RuleRepository, TsdbModel,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A recorded counting query
#[derive(Debug, Clone, PartialEq)]
pub struct CountCall {
    pub model: TsdbModel,
    pub keys: Vec<GroupId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tenant_ids: TenantIds,
}

#[derive(Default)]
pub struct MemoryStore {
    projects: HashMap<ProjectId, Project>,
    groups: HashMap<GroupId, Group>,
    rules: HashMap<RuleId, Rule>,
    event_counts: HashMap<GroupId, u64>,
    user_counts: HashMap<GroupId, u64>,
    fail_counts: AtomicBool,
    group_lookups: AtomicUsize,
    rule_lookups: AtomicUsize,
    count_calls: Mutex<Vec<CountCall>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&mut self, project: Project) {
        self.projects.insert(project.id, project);
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.insert(group.id, group);
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.insert(rule.id, rule);
    }

    /// Counts reported for `group_id` regardless of the queried window
    pub fn set_counts(&mut self, group_id: GroupId, events: u64, users: u64) {
        self.event_counts.insert(group_id, events);
        self.user_counts.insert(group_id, users);
    }

    /// Make every counting query fail with `CountingError::Unavailable`
    pub fn fail_counts(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    pub fn group_lookups(&self) -> usize {
        self.group_lookups.load(Ordering::SeqCst)
    }

    pub fn rule_lookups(&self) -> usize {
        self.rule_lookups.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> Vec<CountCall> {
        self.count_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn query(
        &self,
        model: TsdbModel,
        keys: &[GroupId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tenant_ids: &TenantIds,
        table: &HashMap<GroupId, u64>,
    ) -> Result<HashMap<GroupId, u64>, CountingError> {
        if let Ok(mut calls) = self.count_calls.lock() {
            calls.push(CountCall {
                model,
                keys: keys.to_vec(),
                start,
                end,
                tenant_ids: *tenant_ids,
            });
        }

        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(CountingError::Unavailable(
                "memory store configured to fail".to_string(),
            ));
        }

        Ok(keys
            .iter()
            .map(|id| (*id, table.get(id).copied().unwrap_or(0)))
            .collect())
    }
}

impl ProjectRepository for MemoryStore {
    fn get(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError> {
        Ok(self.projects.get(&id).cloned())
    }
}

impl GroupRepository for MemoryStore {
    fn in_bulk(&self, ids: &[GroupId]) -> Result<HashMap<GroupId, Group>, RepositoryError> {
        self.group_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| self.groups.get(id).map(|g| (*id, g.clone())))
            .collect())
    }
}

impl RuleRepository for MemoryStore {
    fn in_bulk(&self, ids: &[RuleId]) -> Result<HashMap<RuleId, Rule>, RepositoryError> {
        self.rule_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| self.rules.get(id).map(|r| (*id, r.clone())))
            .collect())
    }
}

impl CountingService for MemoryStore {
    fn get_sums(
        &self,
        model: TsdbModel,
        keys: &[GroupId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tenant_ids: &TenantIds,
    ) -> Result<HashMap<GroupId, u64>, CountingError> {
        self.query(model, keys, start, end, tenant_ids, &self.event_counts)
    }

    fn get_distinct_counts_totals(
        &self,
        model: TsdbModel,
        keys: &[GroupId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tenant_ids: &TenantIds,
    ) -> Result<HashMap<GroupId, u64>, CountingError> {
        self.query(model, keys, start, end, tenant_ids, &self.user_counts)
    }
}
