//! Digest records and the builder that turns matched events into them

use super::log::DigestLog;
use super::models::{Group, GroupId, ProjectId, Rule, RuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The slice of an event a digest needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub project_id: ProjectId,
    pub group_id: Option<GroupId>,
    pub datetime: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event: Event,
    /// Ids of the rules the event matched, in match order
    pub rules: Vec<RuleId>,
    pub notification_uuid: Option<String>,
}

/// One matched event waiting in a digest batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: Notification,
    /// Seconds since the epoch
    pub timestamp: f64,
}

impl Record {
    pub fn new(key: String, value: Notification, timestamp: f64) -> Self {
        Self {
            key,
            value,
            timestamp,
        }
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.value.event.group_id
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        datetime_from_timestamp(self.timestamp)
    }

    /// Parse a record from a JSONL line
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Record key={} timestamp={}>", self.key, self.timestamp)
    }
}

/// A record paired with the group it was filed under
#[derive(Debug, Clone, PartialEq)]
pub struct DigestRecord {
    pub record: Record,
    pub group: Arc<Group>,
}

pub fn timestamp_from_datetime(datetime: &DateTime<Utc>) -> f64 {
    datetime.timestamp() as f64 + f64::from(datetime.timestamp_subsec_nanos()) / 1e9
}

/// `None` for non-finite or out-of-range timestamps
pub fn datetime_from_timestamp(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round().min(999_999_999.0) as u32;
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Builds records for events that matched one or more rules
pub struct RecordBuilder {
    log: Arc<dyn DigestLog>,
}

impl RecordBuilder {
    pub fn new(log: Arc<dyn DigestLog>) -> Self {
        Self { log }
    }

    /// Rule ids keep their order and duplicates. A record with no rules is
    /// legal but the digest builder will drop it.
    pub fn build(&self, event: Event, rules: &[Rule], notification_uuid: Option<String>) -> Record {
        if rules.is_empty() {
            self.log.warning(format_args!(
                "Creating record for {} that does not contain any rules!",
                event.event_id
            ));
        }

        let timestamp = timestamp_from_datetime(&event.datetime);
        Record::new(
            event.event_id.clone(),
            Notification {
                event,
                rules: rules.iter().map(|rule| rule.id).collect(),
                notification_uuid,
            },
            timestamp,
        )
    }
}
