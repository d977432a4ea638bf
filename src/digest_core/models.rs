//! Entities the digest engine reads but never owns

use serde::{Deserialize, Serialize};

pub type ProjectId = i64;
pub type GroupId = i64;
pub type RuleId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: i64,
    pub slug: String,
}

impl Project {
    /// Tenant scope handed to the counting backend
    pub fn tenant_ids(&self) -> TenantIds {
        TenantIds {
            organization_id: self.organization_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantIds {
    pub organization_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupStatus {
    #[serde(rename = "unresolved")]
    Unresolved,
    #[serde(rename = "resolved")]
    Resolved,
    #[serde(rename = "ignored")]
    Ignored,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Unresolved => "unresolved",
            GroupStatus::Resolved => "resolved",
            GroupStatus::Ignored => "ignored",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unresolved" => Some(GroupStatus::Unresolved),
            "resolved" => Some(GroupStatus::Resolved),
            "ignored" => Some(GroupStatus::Ignored),
            _ => None,
        }
    }
}

/// An issue: events sharing a fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: GroupStatus,
}

impl Group {
    pub fn is_unresolved(&self) -> bool {
        matches!(self.status, GroupStatus::Unresolved)
    }
}

/// A configured alert condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub project_id: ProjectId,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_status_names() {
        for status in [
            GroupStatus::Unresolved,
            GroupStatus::Resolved,
            GroupStatus::Ignored,
        ] {
            assert_eq!(GroupStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(GroupStatus::from_str("muted"), None);
    }

    #[test]
    fn test_only_unresolved_is_unresolved() {
        let mut group = Group {
            id: 1,
            project_id: 1,
            title: "TypeError".to_string(),
            status: GroupStatus::Unresolved,
        };
        assert!(group.is_unresolved());

        group.status = GroupStatus::Ignored;
        assert!(!group.is_unresolved());
    }
}
