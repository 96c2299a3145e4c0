//! Wire protocol for notebook collaboration
//!
//! Every transport message is one UTF-8 JSON document, a tagged union with
//! a `type` discriminator and a `payload` body. No batching, no framing
//! beyond what the transport provides. The tag values and payload field
//! names are a wire contract shared with other client implementations, so
//! they are pinned by tests below.
//!
//! Messages that do not parse into this vocabulary are noise on a shared
//! channel and get discarded by the receive paths, never surfaced as errors.

use serde::{Deserialize, Serialize};

use crate::error::{CollabError, CollabResult};
use crate::types::{Address, NoteId, NoteSnapshot, NotebookId, SenderId};

/// Prefix of every derived collaboration topic.
pub const TOPIC_PREFIX: &str = "quillsync";

/// The full state of one note edit, broadcast to collaborators.
///
/// Carries the complete note rather than a delta, so applying the highest
/// version is all a receiver needs for convergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    pub notebook_id: NotebookId,
    pub note_id: NoteId,
    pub title: String,
    pub content: String,
    /// Editor's wall clock, epoch milliseconds. Informational only; version
    /// decides conflicts.
    pub updated_at: i64,
    /// Per-note logical version stamped by the sender's clock.
    pub version: u64,
    /// Transport identity of the author, used to filter self-echo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<SenderId>,
}

impl NoteUpdate {
    /// The store-shaped view of this update.
    pub fn to_snapshot(&self) -> NoteSnapshot {
        NoteSnapshot {
            id: self.note_id.clone(),
            notebook_id: self.notebook_id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Invitation to collaborate on a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookInvite {
    pub notebook_id: NotebookId,
    pub notebook_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviter_name: Option<String>,
    pub inviter_address: Address,
}

/// Everything that travels on a collaboration channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum CollabMessage {
    /// A note edit. The tag is `crdt-update` on the wire.
    CrdtUpdate(NoteUpdate),
    /// A notebook invitation, tag `invite`.
    Invite(NotebookInvite),
}

impl CollabMessage {
    /// Serialize for transmission.
    pub fn encode(&self) -> CollabResult<String> {
        serde_json::to_string(self).map_err(|e| CollabError::Serialization(e.to_string()))
    }

    /// Parse a received message. Strict: unknown tags, missing payload
    /// fields, or invalid addresses are all errors.
    pub fn decode(text: &str) -> CollabResult<Self> {
        serde_json::from_str(text).map_err(|e| CollabError::Serialization(e.to_string()))
    }

    /// Notebook this message belongs to.
    pub fn notebook_id(&self) -> &NotebookId {
        match self {
            CollabMessage::CrdtUpdate(update) => &update.notebook_id,
            CollabMessage::Invite(invite) => &invite.notebook_id,
        }
    }

    pub fn is_invite(&self) -> bool {
        matches!(self, CollabMessage::Invite(_))
    }

    pub fn is_update(&self) -> bool {
        matches!(self, CollabMessage::CrdtUpdate(_))
    }
}

/// Deterministic topic identifier for a notebook.
///
/// Both sides of a collaboration derive the same topic independently, so
/// it is never negotiated or carried in an invite.
pub fn notebook_topic(notebook_id: &NotebookId) -> String {
    format!("{TOPIC_PREFIX}:notebook:{notebook_id}")
}
