//! Collaboration status and events
//!
//! `CollabStatus` is the one-word answer to "what is the engine doing",
//! rendered directly in the UI. `CollabEvent` is the push side: the
//! controller broadcasts one for every externally visible change so a UI
//! can stay current without polling.

use std::fmt;

use crate::sync::protocol::{NoteUpdate, NotebookInvite};
use crate::types::{Address, Contact};

/// Lifecycle state of the collaboration controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollabStatus {
    /// No session, nothing in flight.
    Idle,
    /// A start or accept is underway.
    Starting,
    /// A session is live and broadcasting.
    Active,
    /// The last start failed; the message is shown to the user.
    Error(String),
}

impl CollabStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, CollabStatus::Active)
    }

    /// The failure message, when in the error state.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            CollabStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl Default for CollabStatus {
    fn default() -> Self {
        CollabStatus::Idle
    }
}

impl fmt::Display for CollabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollabStatus::Idle => write!(f, "Idle"),
            CollabStatus::Starting => write!(f, "Starting"),
            CollabStatus::Active => write!(f, "Active"),
            CollabStatus::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

/// Push notifications emitted by the controller.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// The status changed; carries the new value.
    StatusChanged { status: CollabStatus },
    /// An invite arrived and is now pending a user decision.
    InviteReceived { invite: NotebookInvite },
    /// A remote edit passed the version check and was written to the store.
    RemoteNoteApplied { update: NoteUpdate },
    /// A contact was added, by the user or by accepting an invite.
    ContactAdded { contact: Contact },
    /// A contact was removed.
    ContactRemoved { address: Address },
}
