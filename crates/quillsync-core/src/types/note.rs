//! Notebook and note records
//!
//! These mirror what the local store persists. The engine treats note
//! content as opaque text; only identifiers and timestamps carry meaning
//! here. Timestamps are Unix epoch milliseconds throughout.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Identifier of a notebook, assigned by the local store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotebookId(String);

impl NotebookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NotebookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NotebookId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of a note within a notebook.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NoteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Full state of one note, as handed to `broadcast` or written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSnapshot {
    pub id: NoteId,
    pub notebook_id: NotebookId,
    pub title: String,
    pub content: String,
    /// Last modification time, epoch milliseconds.
    pub updated_at: i64,
}

/// A notebook row in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookRecord {
    pub id: NotebookId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    /// Derived collaboration topic, set once the notebook is shared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl NotebookRecord {
    /// Build the local replica of a notebook we were invited into.
    ///
    /// The id and name come from the invite; timestamps are stamped with
    /// local time because the invite carries none.
    pub fn replica(id: NotebookId, name: impl Into<String>, topic: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id,
            name: name.into(),
            created_at: now,
            updated_at: now,
            topic: Some(topic.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_stamps_local_time_and_topic() {
        let before = Utc::now().timestamp_millis();
        let record = NotebookRecord::replica(
            NotebookId::from("nb1"),
            "Trip Plans",
            "quillsync:notebook:nb1",
        );
        let after = Utc::now().timestamp_millis();

        assert_eq!(record.id.as_str(), "nb1");
        assert_eq!(record.name, "Trip Plans");
        assert_eq!(record.topic.as_deref(), Some("quillsync:notebook:nb1"));
        assert!(record.created_at >= before && record.created_at <= after);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let note = NoteSnapshot {
            id: NoteId::from("n1"),
            notebook_id: NotebookId::from("nb1"),
            title: "Packing list".to_string(),
            content: "socks".to_string(),
            updated_at: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"notebookId\":\"nb1\""));
        assert!(json.contains("\"updatedAt\":1700000000000"));
    }

    #[test]
    fn notebook_id_emptiness() {
        assert!(NotebookId::from("").is_empty());
        assert!(NotebookId::from("   ").is_empty());
        assert!(!NotebookId::from("nb1").is_empty());
    }
}
