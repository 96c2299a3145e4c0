//! Collaboration session
//!
//! A `CollabSession` is the live half of sharing one notebook: it owns the
//! pairwise channels to collaborators, stamps outgoing edits through the
//! version clock, and feeds remote edits that survive the version check to
//! a `RemoteUpdateHandler`. Sessions are single-use. Starting or accepting
//! a collaboration builds a fresh one; stopping tears it down for good.
//!
//! Cancellation is cooperative. Every receive loop is bound to the epoch
//! counter value captured when it was spawned, and `stop` bumps the
//! counter. Work still in flight for an older epoch is discarded at the
//! next checkpoint, so a slow transport teardown can never write through
//! a session the user already closed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::VersionClock;
use crate::error::{CollabError, CollabResult};
use crate::sync::protocol::{CollabMessage, NoteUpdate, NotebookInvite};
use crate::transport::{Channel, ChannelMessage, MessageStream, Messenger};
use crate::types::{Address, Contact, NoteSnapshot, NotebookId, SenderId};

/// Receives remote updates that passed the version check.
///
/// Implementations integrate the update into the local store and UI. An
/// error is logged by the session and never stops the receive loop; the
/// next update for the same note simply wins again.
#[async_trait]
pub trait RemoteUpdateHandler: Send + Sync {
    async fn on_remote_update(&self, update: NoteUpdate) -> CollabResult<()>;
}

/// State the receive loops share with the session that spawned them.
struct SessionShared {
    notebook_id: NotebookId,
    local_identity: SenderId,
    running: AtomicBool,
    epoch: AtomicU64,
    clock: Mutex<VersionClock>,
    handler: Arc<dyn RemoteUpdateHandler>,
}

impl SessionShared {
    fn epoch_current(&self, epoch: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Ingest one message from a channel subscribed at `epoch`.
    async fn handle_channel_message(&self, epoch: u64, message: ChannelMessage) {
        if message.sender == self.local_identity {
            // own broadcast echoed back on the channel
            return;
        }
        let parsed = match CollabMessage::decode(&message.content) {
            Ok(parsed) => parsed,
            Err(_) => {
                debug!(
                    bytes = message.content.len(),
                    "discarding unparseable channel message"
                );
                return;
            }
        };
        match parsed {
            CollabMessage::Invite(_) => {
                // invites are the controller's concern; on a live session
                // channel they are already redundant
                debug!(notebook = %self.notebook_id, "ignoring invite on active session channel");
            }
            CollabMessage::CrdtUpdate(update) => self.apply_remote_update(epoch, update).await,
        }
    }

    async fn apply_remote_update(&self, epoch: u64, update: NoteUpdate) {
        if update.notebook_id != self.notebook_id {
            debug!(
                notebook = %update.notebook_id,
                own = %self.notebook_id,
                "update for another notebook; ignoring"
            );
            return;
        }
        if !self.epoch_current(epoch) {
            debug!(note = %update.note_id, "session superseded; dropping update");
            return;
        }
        let fresh = {
            let mut clock = self.clock.lock();
            if clock.should_apply(&update) {
                clock.record(&update);
                true
            } else {
                false
            }
        };
        if !fresh {
            debug!(
                note = %update.note_id,
                version = update.version,
                "stale or duplicate update; ignoring"
            );
            return;
        }
        if !self.epoch_current(epoch) {
            debug!(note = %update.note_id, "session stopped before apply; dropping update");
            return;
        }
        match self.handler.on_remote_update(update.clone()).await {
            Ok(()) => {
                debug!(
                    note = %update.note_id,
                    version = update.version,
                    "applied remote update"
                );
            }
            Err(e) => {
                warn!(note = %update.note_id, error = %e, "remote update handler failed");
            }
        }
    }
}

/// Live synchronization of one notebook with a set of contacts.
pub struct CollabSession {
    shared: Arc<SessionShared>,
    messenger: Arc<dyn Messenger>,
    inviter_name: Option<String>,
    channels: RwLock<HashMap<Address, Arc<dyn Channel>>>,
    recv_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CollabSession {
    pub fn new(
        notebook_id: NotebookId,
        messenger: Arc<dyn Messenger>,
        handler: Arc<dyn RemoteUpdateHandler>,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            notebook_id,
            local_identity: messenger.local_identity(),
            running: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            clock: Mutex::new(VersionClock::new()),
            handler,
        });
        Self {
            shared,
            messenger,
            inviter_name: None,
            channels: RwLock::new(HashMap::new()),
            recv_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Display name to put on outgoing invites.
    pub fn with_inviter_name(mut self, name: impl Into<String>) -> Self {
        self.inviter_name = Some(name.into());
        self
    }

    pub fn notebook_id(&self) -> &NotebookId {
        &self.shared.notebook_id
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Number of live collaborator channels.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Start collaborating: open a channel to every reachable contact and
    /// send each one an invite.
    ///
    /// Contacts the transport reports unreachable are skipped with a log.
    /// A failed reachability check is treated as everyone-reachable so a
    /// flaky check cannot block a start. Channel or invite failures abort
    /// the whole start: the session is torn down and a `SessionStart`
    /// error naming every failed contact is returned.
    ///
    /// Starting with no contacts, or none reachable, yields a running but
    /// inert session. Edits stay local until someone accepts an invite.
    pub async fn start(&self, contacts: &[Contact], notebook_name: &str) -> CollabResult<()> {
        self.shared.running.store(true, Ordering::SeqCst);
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            notebook = %self.shared.notebook_id,
            contacts = contacts.len(),
            "starting collaboration session"
        );

        if contacts.is_empty() {
            debug!(notebook = %self.shared.notebook_id, "no contacts; session is inert");
            return Ok(());
        }

        let reachable = self.filter_reachable(contacts).await;
        if reachable.is_empty() {
            debug!(
                notebook = %self.shared.notebook_id,
                "no reachable contacts; session is inert"
            );
            return Ok(());
        }

        let invite = CollabMessage::Invite(NotebookInvite {
            notebook_id: self.shared.notebook_id.clone(),
            notebook_name: notebook_name.to_string(),
            inviter_name: self.inviter_name.clone(),
            inviter_address: self.messenger.local_address(),
        });
        let invite_text = match invite.encode() {
            Ok(text) => text,
            Err(e) => {
                self.stop();
                return Err(e);
            }
        };

        let attempts = join_all(
            reachable
                .iter()
                .map(|contact| self.connect_contact(contact, &invite_text, epoch)),
        )
        .await;

        let mut opened = HashMap::new();
        let mut spawned = Vec::new();
        let mut failures = Vec::new();
        for attempt in attempts {
            match attempt {
                Ok((address, channel, handle)) => {
                    opened.insert(address, channel);
                    spawned.extend(handle);
                }
                Err(e) => failures.push(e.to_string()),
            }
        }

        if !failures.is_empty() {
            for task in &spawned {
                task.abort();
            }
            self.stop();
            return Err(CollabError::SessionStart(failures.join("; ")));
        }

        {
            let mut channels = self.channels.write();
            if !self.shared.epoch_current(epoch) {
                // a stop raced the start; do not resurrect
                drop(channels);
                for task in &spawned {
                    task.abort();
                }
                debug!(
                    notebook = %self.shared.notebook_id,
                    "start superseded during channel setup; discarding"
                );
                return Ok(());
            }
            *channels = opened;
            self.recv_tasks.lock().extend(spawned);
        }

        info!(
            notebook = %self.shared.notebook_id,
            channels = self.channel_count(),
            "collaboration session started"
        );
        Ok(())
    }

    /// Broadcast a local note edit to every collaborator channel.
    ///
    /// Stamps the next version for the note and sends the full snapshot.
    /// Send failures are logged per channel and never propagate; the next
    /// edit carries a fresher version anyway.
    pub async fn broadcast(&self, note: &NoteSnapshot) {
        if !self.is_running() {
            debug!(note = %note.id, "no active session; edit stays local");
            return;
        }
        if note.notebook_id != self.shared.notebook_id {
            debug!(
                notebook = %note.notebook_id,
                own = %self.shared.notebook_id,
                "edit belongs to another notebook; not broadcasting"
            );
            return;
        }

        let version = self.shared.clock.lock().next_version(&note.id);
        let update = NoteUpdate {
            notebook_id: note.notebook_id.clone(),
            note_id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            updated_at: note.updated_at,
            version,
            author: Some(self.shared.local_identity.clone()),
        };
        let text = match CollabMessage::CrdtUpdate(update).encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(note = %note.id, error = %e, "failed to encode note edit");
                return;
            }
        };

        let channels: Vec<(Address, Arc<dyn Channel>)> = self
            .channels
            .read()
            .iter()
            .map(|(address, channel)| (address.clone(), Arc::clone(channel)))
            .collect();
        debug!(
            note = %note.id,
            version,
            peers = channels.len(),
            "broadcasting note edit"
        );

        let text = &text;
        join_all(channels.iter().map(|(address, channel)| async move {
            if let Err(e) = channel.send(text).await {
                warn!(peer = %address, error = %e, "failed to deliver note edit");
            }
        }))
        .await;
    }

    /// Tear the session down: supersede the epoch, abort receive loops,
    /// drop channels, reset the clock. Safe to call more than once.
    pub fn stop(&self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);

        let tasks = std::mem::take(&mut *self.recv_tasks.lock());
        for task in &tasks {
            task.abort();
        }
        self.channels.write().clear();
        self.shared.clock.lock().clear();

        if was_running {
            info!(notebook = %self.shared.notebook_id, "collaboration session stopped");
        }
    }

    /// Drop contacts the transport says cannot be messaged. When the
    /// check itself fails, every contact is assumed reachable and channel
    /// creation becomes the real gate.
    async fn filter_reachable(&self, contacts: &[Contact]) -> Vec<Contact> {
        let addresses: Vec<Address> = contacts.iter().map(|c| c.address.clone()).collect();
        match self.messenger.reachable(&addresses).await {
            Ok(map) => contacts
                .iter()
                .filter(|contact| {
                    let ok = map.get(&contact.address).copied().unwrap_or(false);
                    if !ok {
                        debug!(peer = %contact.address, "contact not reachable; skipping");
                    }
                    ok
                })
                .cloned()
                .collect(),
            Err(e) => {
                warn!(
                    error = %e,
                    "reachability check failed; assuming all contacts reachable"
                );
                contacts.to_vec()
            }
        }
    }

    /// Open the channel to one contact, deliver the invite, and spawn the
    /// receive loop. The loop handle is `None` when subscription failed;
    /// the channel then still carries outgoing edits.
    async fn connect_contact(
        &self,
        contact: &Contact,
        invite_text: &str,
        epoch: u64,
    ) -> CollabResult<(Address, Arc<dyn Channel>, Option<JoinHandle<()>>)> {
        let address = contact.address.clone();
        let channel = self
            .messenger
            .open_channel(&address)
            .await
            .map_err(|e| CollabError::SessionStart(format!("channel to {address}: {e}")))?;
        channel
            .send(invite_text)
            .await
            .map_err(|e| CollabError::SessionStart(format!("invite to {address}: {e}")))?;
        debug!(peer = %address, notebook = %self.shared.notebook_id, "invite sent");

        let handle = match channel.subscribe().await {
            Ok(stream) => Some(self.spawn_recv_loop(address.clone(), stream, epoch)),
            Err(e) => {
                warn!(
                    peer = %address,
                    error = %e,
                    "channel subscription failed; channel is send-only"
                );
                None
            }
        };
        Ok((address, channel, handle))
    }

    fn spawn_recv_loop(
        &self,
        peer: Address,
        mut stream: MessageStream,
        epoch: u64,
    ) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            debug!(peer = %peer, notebook = %shared.notebook_id, "receive loop started");
            while let Some(message) = stream.next().await {
                if !shared.epoch_current(epoch) {
                    debug!(peer = %peer, "receive loop superseded");
                    break;
                }
                shared.handle_channel_message(epoch, message).await;
            }
            debug!(peer = %peer, "receive loop ended");
        })
    }
}
