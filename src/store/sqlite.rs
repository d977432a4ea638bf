//! SQLite-backed repositories and counting service
//!
//! One connection serves every collaborator of the digest builder. Bulk
//! lookups and counts are a single `IN (...)` query each.

use super::schema::{apply_embedded_schema, apply_pragmas, SchemaError};
use crate::digest_core::models::{
    Group, GroupId, GroupStatus, Project, ProjectId, Rule, RuleId, TenantIds,
};
use crate::digest_core::record::{timestamp_from_datetime, Event};
use crate::digest_core::repository::{
    CountingError, CountingService, GroupRepository, ProjectRepository, RepositoryError,
    RuleRepository, TsdbModel,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file; the schema must already be applied
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(db_path)?;
        apply_pragmas(&conn)?;
        Ok(Self { conn })
    }

    /// Private in-memory database with the embedded schema applied
    pub fn open_in_memory() -> Result<Self, SchemaError> {
        let conn = Connection::open_in_memory()?;
        apply_embedded_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert_project(&self, project: &Project) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO projects (id, organization_id, slug) VALUES (?1, ?2, ?3)",
            params![project.id, project.organization_id, project.slug],
        )?;
        Ok(())
    }

    pub fn insert_group(&self, group: &Group) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO issue_groups (id, project_id, title, status) VALUES (?1, ?2, ?3, ?4)",
            params![group.id, group.project_id, group.title, group.status.as_str()],
        )?;
        Ok(())
    }

    pub fn set_group_status(&self, id: GroupId, status: GroupStatus) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE issue_groups SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    pub fn insert_rule(&self, rule: &Rule) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO rules (id, project_id, label) VALUES (?1, ?2, ?3)",
            params![rule.id, rule.project_id, rule.label],
        )?;
        Ok(())
    }

    /// Record one occurrence for the windowed counters
    ///
    /// Events without a group are not counted and are skipped.
    pub fn insert_event(&self, event: &Event, user_key: Option<&str>) -> Result<(), rusqlite::Error> {
        let Some(group_id) = event.group_id else {
            log::debug!("Event {} has no group, not counted", event.event_id);
            return Ok(());
        };

        self.conn.execute(
            "INSERT INTO events (event_id, project_id, group_id, user_key, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.event_id,
                event.project_id,
                group_id,
                user_key,
                timestamp_from_datetime(&event.datetime)
            ],
        )?;
        Ok(())
    }

    fn windowed_counts(
        &self,
        aggregate: &str,
        keys: &[GroupId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<GroupId, u64>, rusqlite::Error> {
        let mut counts: HashMap<GroupId, u64> = keys.iter().map(|id| (*id, 0)).collect();
        if keys.is_empty() {
            return Ok(counts);
        }

        let sql = format!(
            "SELECT group_id, {} FROM events
             WHERE group_id IN ({}) AND timestamp BETWEEN ? AND ?
             GROUP BY group_id",
            aggregate,
            placeholders(keys.len())
        );
        let mut values: Vec<Value> = keys.iter().map(|id| Value::Integer(*id)).collect();
        values.push(Value::Real(timestamp_from_datetime(&start)));
        values.push(Value::Real(timestamp_from_datetime(&end)));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, GroupId>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (group_id, count) = row?;
            counts.insert(group_id, count.max(0) as u64);
        }
        Ok(counts)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn id_values(ids: &[i64]) -> Vec<Value> {
    ids.iter().map(|id| Value::Integer(*id)).collect()
}

impl ProjectRepository for SqliteStore {
    fn get(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError> {
        let project = self
            .conn
            .query_row(
                "SELECT id, organization_id, slug FROM projects WHERE id = ?1",
                [id],
                |row| {
                    Ok(Project {
                        id: row.get(0)?,
                        organization_id: row.get(1)?,
                        slug: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(project)
    }
}

impl GroupRepository for SqliteStore {
    fn in_bulk(&self, ids: &[GroupId]) -> Result<HashMap<GroupId, Group>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT id, project_id, title, status FROM issue_groups WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(id_values(ids).iter()), |row| {
            Ok((
                row.get::<_, GroupId>(0)?,
                row.get::<_, ProjectId>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut groups = HashMap::new();
        for row in rows {
            let (id, project_id, title, status) = row?;
            let status = GroupStatus::from_str(&status).ok_or_else(|| {
                RepositoryError::Corrupt(format!("group {} has unknown status {:?}", id, status))
            })?;
            groups.insert(
                id,
                Group {
                    id,
                    project_id,
                    title,
                    status,
                },
            );
        }
        Ok(groups)
    }
}

impl RuleRepository for SqliteStore {
    fn in_bulk(&self, ids: &[RuleId]) -> Result<HashMap<RuleId, Rule>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT id, project_id, label FROM rules WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(id_values(ids).iter()), |row| {
            Ok(Rule {
                id: row.get(0)?,
                project_id: row.get(1)?,
                label: row.get(2)?,
            })
        })?;

        let mut rules = HashMap::new();
        for row in rows {
            let rule = row?;
            rules.insert(rule.id, rule);
        }
        Ok(rules)
    }
}

/// Single-tenant store: tenant ids are accepted and ignored
impl CountingService for SqliteStore {
    fn get_sums(
        &self,
        model: TsdbModel,
        keys: &[GroupId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _tenant_ids: &TenantIds,
    ) -> Result<HashMap<GroupId, u64>, CountingError> {
        log::debug!("📥 {:?} sums for {} groups", model, keys.len());
        Ok(self.windowed_counts("COUNT(*)", keys, start, end)?)
    }

    fn get_distinct_counts_totals(
        &self,
        model: TsdbModel,
        keys: &[GroupId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _tenant_ids: &TenantIds,
    ) -> Result<HashMap<GroupId, u64>, CountingError> {
        log::debug!("📥 {:?} distinct totals for {} groups", model, keys.len());
        Ok(self.windowed_counts("COUNT(DISTINCT user_key)", keys, start, end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest_core::record::datetime_from_timestamp;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_project(&Project {
                id: 1,
                organization_id: 9,
                slug: "web".to_string(),
            })
            .unwrap();
        for (id, status) in [(10, GroupStatus::Unresolved), (20, GroupStatus::Resolved)] {
            store
                .insert_group(&Group {
                    id,
                    project_id: 1,
                    title: format!("issue {}", id),
                    status,
                })
                .unwrap();
        }
        store
            .insert_rule(&Rule {
                id: 5,
                project_id: 1,
                label: "new issue".to_string(),
            })
            .unwrap();
        store
    }

    fn event(id: &str, group_id: GroupId, timestamp: f64) -> Event {
        Event {
            event_id: id.to_string(),
            project_id: 1,
            group_id: Some(group_id),
            datetime: datetime_from_timestamp(timestamp).unwrap(),
            title: String::new(),
        }
    }

    #[test]
    fn test_project_lookup() {
        let store = seeded();
        assert_eq!(store.get(1).unwrap().unwrap().organization_id, 9);
        assert!(store.get(2).unwrap().is_none());
    }

    #[test]
    fn test_bulk_lookups_skip_missing_ids() {
        let store = seeded();

        let groups = GroupRepository::in_bulk(&store, &[10, 20, 30]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&20].status, GroupStatus::Resolved);

        let rules = RuleRepository::in_bulk(&store, &[5, 6]).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[&5].label, "new issue");

        assert!(GroupRepository::in_bulk(&store, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_status_update() {
        let store = seeded();
        store.set_group_status(20, GroupStatus::Unresolved).unwrap();
        let groups = GroupRepository::in_bulk(&store, &[20]).unwrap();
        assert!(groups[&20].is_unresolved());
    }

    #[test]
    fn test_windowed_counts() {
        let store = seeded();
        store.insert_event(&event("a", 10, 100.0), Some("u1")).unwrap();
        store.insert_event(&event("b", 10, 150.0), Some("u1")).unwrap();
        store.insert_event(&event("c", 10, 200.0), Some("u2")).unwrap();
        store.insert_event(&event("d", 10, 900.0), Some("u3")).unwrap();
        store.insert_event(&event("e", 20, 120.0), None).unwrap();

        let start = datetime_from_timestamp(100.0).unwrap();
        let end = datetime_from_timestamp(200.0).unwrap();
        let tenant = TenantIds { organization_id: 9 };

        let sums = store
            .get_sums(TsdbModel::Group, &[10, 20, 30], start, end, &tenant)
            .unwrap();
        assert_eq!(sums[&10], 3);
        assert_eq!(sums[&20], 1);
        assert_eq!(sums[&30], 0);

        let users = store
            .get_distinct_counts_totals(TsdbModel::UsersAffectedByGroup, &[10, 20, 30], start, end, &tenant)
            .unwrap();
        assert_eq!(users[&10], 2);
        assert_eq!(users[&20], 0);
        assert_eq!(users[&30], 0);
    }

    #[test]
    fn test_event_without_group_is_not_counted() {
        let store = seeded();
        let mut orphan = event("x", 10, 100.0);
        orphan.group_id = None;
        store.insert_event(&orphan, Some("u1")).unwrap();

        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
