//! Routing key codec
//!
//! A routing key names the project and notification target a digest batch
//! belongs to:
//!
//! ```text
//! mail:p:<project_id>:<target_type>:<target_identifier>:<fallthrough_choice>
//! ```
//!
//! Keys written before fallthrough choices existed stop after the target
//! identifier, and the oldest keys carry only the project id. All three
//! shapes decode; encoding always produces the current one.

use super::models::{Project, ProjectId};
use super::repository::{ProjectRepository, RepositoryError};
use serde::{Deserialize, Serialize};
use std::fmt;

const KEY_PREFIX: &str = "mail";
const PROJECT_SCOPE: &str = "p";
const MAX_SEGMENTS: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("malformed routing key: {0:?}")]
    Malformed(String),

    #[error("invalid project id in routing key: {0:?}")]
    InvalidProjectId(String),

    #[error("unknown action target type: {0:?}")]
    UnknownTargetType(String),

    #[error("project {0} not found")]
    NotFound(ProjectId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Who a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionTargetType {
    IssueOwners,
    Team,
    Member,
}

impl ActionTargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTargetType::IssueOwners => "IssueOwners",
            ActionTargetType::Team => "Team",
            ActionTargetType::Member => "Member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IssueOwners" => Some(ActionTargetType::IssueOwners),
            "Team" => Some(ActionTargetType::Team),
            "Member" => Some(ActionTargetType::Member),
            _ => None,
        }
    }
}

/// Recipient policy when an issue has no explicit owners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FallthroughChoice {
    AllMembers,
    ActiveMembers,
    NoOne,
}

impl FallthroughChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallthroughChoice::AllMembers => "AllMembers",
            FallthroughChoice::ActiveMembers => "ActiveMembers",
            FallthroughChoice::NoOne => "NoOne",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "AllMembers" => Some(FallthroughChoice::AllMembers),
            "ActiveMembers" => Some(FallthroughChoice::ActiveMembers),
            "NoOne" => Some(FallthroughChoice::NoOne),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    pub project_id: ProjectId,
    pub target_type: ActionTargetType,
    pub target_identifier: Option<String>,
    pub fallthrough_choice: Option<FallthroughChoice>,
}

impl RoutingKey {
    pub fn new(
        project_id: ProjectId,
        target_type: ActionTargetType,
        target_identifier: Option<String>,
        fallthrough_choice: Option<FallthroughChoice>,
    ) -> Self {
        Self {
            project_id,
            target_type,
            target_identifier,
            fallthrough_choice,
        }
    }

    /// Decode any of the three key shapes without touching storage
    ///
    /// The first two segments are not checked. An unrecognised fallthrough
    /// segment decodes to `None` so keys written by newer code stay readable.
    pub fn decode(key: &str) -> Result<Self, KeyError> {
        let parts: Vec<&str> = key.splitn(MAX_SEGMENTS, ':').collect();
        if parts.len() < 3 {
            return Err(KeyError::Malformed(key.to_string()));
        }

        let project_id = parts[2]
            .parse::<ProjectId>()
            .map_err(|_| KeyError::InvalidProjectId(parts[2].to_string()))?;

        let decoded = match parts.len() {
            6 => Self::new(
                project_id,
                parse_target_type(parts[3])?,
                non_empty(parts[4]),
                FallthroughChoice::from_str(parts[5]),
            ),
            5 => Self::new(
                project_id,
                parse_target_type(parts[3])?,
                non_empty(parts[4]),
                None,
            ),
            _ => Self::new(project_id, ActionTargetType::IssueOwners, None, None),
        };

        Ok(decoded)
    }

    /// Encode in the current six-segment shape
    ///
    /// The target identifier must not contain `:`. Anything after its first
    /// colon would decode as the fallthrough segment.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            KEY_PREFIX,
            PROJECT_SCOPE,
            self.project_id,
            self.target_type.as_str(),
            self.target_identifier.as_deref().unwrap_or(""),
            self.fallthrough_choice.map(|f| f.as_str()).unwrap_or(""),
        )
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_target_type(segment: &str) -> Result<ActionTargetType, KeyError> {
    ActionTargetType::from_str(segment).ok_or_else(|| KeyError::UnknownTargetType(segment.to_string()))
}

fn non_empty(segment: &str) -> Option<String> {
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Decode a key and resolve its project
pub fn split_key<P: ProjectRepository + ?Sized>(
    key: &str,
    projects: &P,
) -> Result<
    (
        Project,
        ActionTargetType,
        Option<String>,
        Option<FallthroughChoice>,
    ),
    KeyError,
> {
    let decoded = RoutingKey::decode(key)?;
    let project = projects
        .get(decoded.project_id)?
        .ok_or(KeyError::NotFound(decoded.project_id))?;

    Ok((
        project,
        decoded.target_type,
        decoded.target_identifier,
        decoded.fallthrough_choice,
    ))
}

pub fn unsplit_key(
    project: &Project,
    target_type: ActionTargetType,
    target_identifier: Option<&str>,
    fallthrough_choice: Option<FallthroughChoice>,
) -> String {
    RoutingKey::new(
        project.id,
        target_type,
        target_identifier.map(str::to_string),
        fallthrough_choice,
    )
    .encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest_core::memory::MemoryStore;

    fn project() -> Project {
        Project {
            id: 42,
            organization_id: 7,
            slug: "backend".to_string(),
        }
    }

    #[test]
    fn test_round_trip_all_shapes() {
        let project = project();
        let identifiers = [None, Some("team-1")];
        let fallthroughs = [
            None,
            Some(FallthroughChoice::AllMembers),
            Some(FallthroughChoice::ActiveMembers),
            Some(FallthroughChoice::NoOne),
        ];

        for target_type in [
            ActionTargetType::IssueOwners,
            ActionTargetType::Team,
            ActionTargetType::Member,
        ] {
            for identifier in identifiers {
                for fallthrough in fallthroughs {
                    let key = unsplit_key(&project, target_type, identifier, fallthrough);
                    let decoded = RoutingKey::decode(&key).unwrap();
                    assert_eq!(decoded.project_id, project.id);
                    assert_eq!(decoded.target_type, target_type);
                    assert_eq!(decoded.target_identifier.as_deref(), identifier);
                    assert_eq!(decoded.fallthrough_choice, fallthrough);
                }
            }
        }
    }

    #[test]
    fn test_encode_current_format() {
        let key = RoutingKey::new(
            42,
            ActionTargetType::Member,
            Some("1337".to_string()),
            Some(FallthroughChoice::ActiveMembers),
        );
        assert_eq!(key.encode(), "mail:p:42:Member:1337:ActiveMembers");

        let bare = RoutingKey::new(42, ActionTargetType::IssueOwners, None, None);
        assert_eq!(bare.encode(), "mail:p:42:IssueOwners::");
    }

    #[test]
    fn test_legacy_key_without_fallthrough() {
        let legacy = RoutingKey::decode("mail:p:42:Team:9").unwrap();
        let current = RoutingKey::decode("mail:p:42:Team:9:").unwrap();

        assert_eq!(legacy.fallthrough_choice, None);
        assert_eq!(legacy.target_type, current.target_type);
        assert_eq!(legacy.target_identifier, current.target_identifier);
        assert_eq!(legacy.target_identifier.as_deref(), Some("9"));
    }

    #[test]
    fn test_oldest_key_defaults_to_issue_owners() {
        let key = RoutingKey::decode("mail:p:42").unwrap();
        assert_eq!(key.project_id, 42);
        assert_eq!(key.target_type, ActionTargetType::IssueOwners);
        assert_eq!(key.target_identifier, None);
        assert_eq!(key.fallthrough_choice, None);
    }

    #[test]
    fn test_unknown_fallthrough_is_none() {
        for segment in ["Everyone", "", "allmembers", "NoOne:extra"] {
            let key = format!("mail:p:42:IssueOwners::{}", segment);
            let decoded = RoutingKey::decode(&key).unwrap();
            assert_eq!(decoded.fallthrough_choice, None, "segment {:?}", segment);
        }
    }

    #[test]
    fn test_empty_identifier_is_none() {
        let decoded = RoutingKey::decode("mail:p:42:Team::NoOne").unwrap();
        assert_eq!(decoded.target_identifier, None);
        assert_eq!(decoded.fallthrough_choice, Some(FallthroughChoice::NoOne));
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!(
            RoutingKey::decode("mail:p"),
            Err(KeyError::Malformed(_))
        ));
        assert!(matches!(
            RoutingKey::decode("42:Team"),
            Err(KeyError::Malformed(_))
        ));
        assert!(matches!(
            RoutingKey::decode("mail:p:abc:Team::"),
            Err(KeyError::InvalidProjectId(_))
        ));
        assert!(matches!(
            RoutingKey::decode("mail:p:42:Robots::"),
            Err(KeyError::UnknownTargetType(_))
        ));
    }

    #[test]
    fn test_leading_segments_are_not_checked() {
        let decoded = RoutingKey::decode("sms:x:42:Team:9:NoOne").unwrap();
        assert_eq!(decoded.project_id, 42);
        assert_eq!(decoded.target_type, ActionTargetType::Team);
        assert_eq!(decoded.fallthrough_choice, Some(FallthroughChoice::NoOne));
    }

    #[test]
    fn test_colon_in_identifier_spills_into_fallthrough() {
        let key = RoutingKey::new(
            1,
            ActionTargetType::Team,
            Some("a:b".to_string()),
            Some(FallthroughChoice::NoOne),
        );
        assert_eq!(key.encode(), "mail:p:1:Team:a:b:NoOne");

        let decoded = RoutingKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded.target_identifier.as_deref(), Some("a"));
        assert_eq!(decoded.fallthrough_choice, None);
    }

    #[test]
    fn test_split_key_resolves_project() {
        let mut store = MemoryStore::new();
        store.add_project(project());

        let (resolved, target_type, identifier, fallthrough) =
            split_key("mail:p:42:Team:9:AllMembers", &store).unwrap();
        assert_eq!(resolved, project());
        assert_eq!(target_type, ActionTargetType::Team);
        assert_eq!(identifier.as_deref(), Some("9"));
        assert_eq!(fallthrough, Some(FallthroughChoice::AllMembers));

        assert!(matches!(
            split_key("mail:p:43:Team:9:AllMembers", &store),
            Err(KeyError::NotFound(43))
        ));
    }
}
