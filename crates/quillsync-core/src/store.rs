//! Local note store capability interface
//!
//! Persistence belongs to the host application. The engine only needs the
//! four operations below, always on whole rows, and treats any failure as
//! opaque. Store writes from the sync path are what make remote edits
//! durable, so the session surfaces write errors to its caller instead of
//! swallowing them.

use async_trait::async_trait;

use crate::error::CollabResult;
use crate::types::{NoteSnapshot, NotebookId, NotebookRecord};

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Insert or overwrite one note with remote content.
    async fn upsert_note(&self, note: NoteSnapshot) -> CollabResult<()>;

    /// Persist the collaboration topic on an existing notebook.
    async fn update_notebook_topic(
        &self,
        notebook_id: &NotebookId,
        topic: &str,
    ) -> CollabResult<()>;

    /// Create the local replica row for a notebook we were invited into.
    async fn create_replica_notebook(&self, record: NotebookRecord) -> CollabResult<()>;

    /// Fetch a notebook row, `None` when it does not exist locally.
    async fn get_notebook(&self, notebook_id: &NotebookId) -> CollabResult<Option<NotebookRecord>>;
}
