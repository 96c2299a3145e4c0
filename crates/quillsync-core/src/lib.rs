//! Quillsync Core Library
//!
//! Collaborative notebook synchronization for a local-first notes app.
//! Notes live in a local store and are fully usable offline; this crate
//! adds the ability to share a notebook with contacts and keep everyone's
//! copy converging over an end-to-end-encrypted messaging transport.
//!
//! ## Design
//!
//! - **Capabilities in, sync out.** The host injects its messaging layer
//!   (`Messenger`), note store (`NoteStore`), and name-service lookup
//!   (`AliasResolver`). The engine owns everything between: contact
//!   resolution, invites, channels, version bookkeeping.
//! - **Whole-note last-writer-wins.** Edits travel as full snapshots
//!   stamped with a per-note version; receivers apply an update only when
//!   its version is strictly greater than anything seen for that note.
//! - **Noise-tolerant by default.** Channels are shared with other
//!   applications, deliver at-least-once, and echo the sender's own
//!   messages. Everything unparseable, duplicated, or self-authored is
//!   silently dropped.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use quillsync_core::{CollabController, NotebookId, StaticAliasResolver};
//!
//! let controller = CollabController::new(
//!     messenger,                              // Arc<dyn Messenger>
//!     store,                                  // Arc<dyn NoteStore>
//!     Arc::new(StaticAliasResolver::empty()),
//!     Some("Alice".to_string()),
//! )
//! .await;
//!
//! controller.add_contact("bob.eth").await?;
//! controller
//!     .start_collaboration(&NotebookId::from("nb-1"), "Trip Plans")
//!     .await?;
//!
//! // local edits now fan out to collaborators
//! controller.broadcast_local_update(&note).await;
//! ```

pub mod clock;
pub mod error;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod transport;
pub mod types;

pub use clock::VersionClock;
pub use error::{CollabError, CollabResult};
pub use resolver::{AliasResolver, ContactResolver, StaticAliasResolver};
pub use store::NoteStore;
pub use sync::{
    notebook_topic, CollabController, CollabEvent, CollabMessage, CollabSession, CollabStatus,
    NoteUpdate, NotebookInvite, RemoteUpdateHandler, TOPIC_PREFIX,
};
pub use transport::{Channel, ChannelMessage, MessageStream, Messenger};
pub use types::{Address, Contact, NoteId, NoteSnapshot, NotebookId, NotebookRecord, SenderId};
