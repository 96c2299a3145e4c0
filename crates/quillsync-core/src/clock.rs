//! Per-note version tracking
//!
//! Concurrent edits are reconciled with a last-writer-wins rule keyed on a
//! per-note version counter. The clock remembers the highest version seen
//! for each note, stamps outgoing edits one above it, and admits a remote
//! edit only when its version is strictly greater than the recorded one.
//! Duplicates and out-of-order redeliveries fall out of the same rule.
//!
//! State is per session: a fresh session starts every counter at zero.

use std::collections::HashMap;

use crate::sync::protocol::NoteUpdate;
use crate::types::NoteId;

/// Version state for every note touched during a session.
#[derive(Debug, Default)]
pub struct VersionClock {
    versions: HashMap<NoteId, u64>,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version to stamp on the next local edit of a note.
    ///
    /// Advances the recorded version, so the local edit immediately wins
    /// over everything seen so far. An untouched note starts at version 1.
    pub fn next_version(&mut self, note_id: &NoteId) -> u64 {
        let next = self.recorded(note_id) + 1;
        self.versions.insert(note_id.clone(), next);
        next
    }

    /// Whether a remote update should be applied.
    ///
    /// True only when the update's version is strictly greater than the
    /// recorded one. Equal versions are replays and never reapplied.
    pub fn should_apply(&self, update: &NoteUpdate) -> bool {
        update.version > self.recorded(&update.note_id)
    }

    /// Record an applied remote update as the new high-water mark.
    pub fn record(&mut self, update: &NoteUpdate) {
        self.versions.insert(update.note_id.clone(), update.version);
    }

    /// Highest version seen for a note, zero if never seen.
    pub fn recorded(&self, note_id: &NoteId) -> u64 {
        self.versions.get(note_id).copied().unwrap_or(0)
    }

    /// Drop all state. Called when a session ends.
    pub fn clear(&mut self) {
        self.versions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
