use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four scheduling fields the engine reads, plus an identity.
///
/// This is a read-only projection: the engine never sees titles, notes or
/// completion state, so storage schema changes do not reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,

    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub deadline: Option<String>,

    #[serde(default)]
    pub someday: bool,

    #[serde(default)]
    pub created_at: Option<String>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: None,
            deadline: None,
            someday: false,
            created_at: None,
        }
    }

    /// The scheduled date, treating an empty string as absent.
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref().filter(|d| !d.is_empty())
    }

    pub fn deadline(&self) -> Option<&str> {
        self.deadline.as_deref().filter(|d| !d.is_empty())
    }

    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }
}

/// A task as persisted in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTask {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub deadline: Option<String>,

    #[serde(default)]
    pub someday: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl StoredTask {
    pub fn new(title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            notes: None,
            date: None,
            deadline: None,
            someday: false,
            created_at: Some(now),
            completed_at: None,
            archived_at: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

impl From<&StoredTask> for TaskRecord {
    fn from(task: &StoredTask) -> Self {
        Self {
            id: task.id.clone(),
            date: task.date.clone(),
            deadline: task.deadline.clone(),
            someday: task.someday,
            created_at: task
                .created_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn adapter_keeps_only_scheduling_fields() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 8, 9, 15, 0)
            .single()
            .expect("valid now");
        let mut stored = StoredTask::new("Renew passport".to_string(), now);
        stored.date = Some("2026-02-10".to_string());
        stored.deadline = Some("2026-02-20".to_string());
        stored.notes = Some("bring photos".to_string());

        let record = TaskRecord::from(&stored);
        assert_eq!(record.id, stored.id);
        assert_eq!(record.date(), Some("2026-02-10"));
        assert_eq!(record.deadline(), Some("2026-02-20"));
        assert!(!record.someday);
        assert_eq!(record.created_at(), Some("2026-02-08T09:15:00.000Z"));
    }

    #[test]
    fn empty_date_strings_read_as_absent() {
        let mut record = TaskRecord::new("t1");
        record.date = Some(String::new());
        record.deadline = Some(String::new());
        assert_eq!(record.date(), None);
        assert_eq!(record.deadline(), None);
    }

    #[test]
    fn stored_task_round_trips_unknown_fields() {
        let raw = r#"{"id":"abc","title":"Water plants","date":"2026-02-09","createdAt":"2026-02-01T10:00:00Z","listId":"home"}"#;
        let task: StoredTask = serde_json::from_str(raw).expect("parse stored task");
        assert_eq!(task.date.as_deref(), Some("2026-02-09"));
        assert!(!task.someday);
        assert!(!task.is_completed());
        assert_eq!(
            task.extra.get("listId"),
            Some(&serde_json::Value::String("home".to_string()))
        );

        let out = serde_json::to_string(&task).expect("serialize stored task");
        assert!(out.contains("\"listId\":\"home\""));
        assert!(out.contains("\"createdAt\""));
    }
}
