//! Notebook collaboration over the messaging transport
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  CollabController                                            │
//! │  ├── contacts: Vec<Contact>                                  │
//! │  ├── status: Idle | Starting | Active | Error                │
//! │  ├── pending_invite: Option<NotebookInvite>                  │
//! │  ├── invite listener ── Messenger::subscribe_all()           │
//! │  │                                                           │
//! │  └── session: Option<CollabSession>                          │
//! │      ├── channels: HashMap<Address, Channel>                 │
//! │      ├── clock: VersionClock (per-note versions)             │
//! │      └── receive loops ── Channel::subscribe()               │
//! │                                                              │
//! │  NoteStore ◄── applied remote updates, topics, replicas      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The controller is long-lived and owns at most one session. Sessions
//! are disposable: every start or accepted invite builds a new one, and
//! stop destroys it together with its clock and channels.

pub mod controller;
pub mod events;
pub mod protocol;
pub mod session;

pub use controller::CollabController;
pub use events::{CollabEvent, CollabStatus};
pub use protocol::{notebook_topic, CollabMessage, NoteUpdate, NotebookInvite, TOPIC_PREFIX};
pub use session::{CollabSession, RemoteUpdateHandler};
