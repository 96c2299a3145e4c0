//! Collaboration controller
//!
//! The controller is what the host application holds: it keeps the contact
//! list, drives session lifecycle and the status value the UI renders,
//! persists topics and replicas through the note store, and runs the
//! always-on invite listener over the transport's global incoming stream.
//!
//! One session at most is live at a time. Starting a collaboration or
//! accepting an invite replaces whatever was running. Every start-shaped
//! operation is tagged with a sequence number so a slow start that loses a
//! race against stop (or a newer start) cannot commit its session, no
//! matter how late its transport calls resolve.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CollabError, CollabResult};
use crate::resolver::{AliasResolver, ContactResolver};
use crate::store::NoteStore;
use crate::sync::events::{CollabEvent, CollabStatus};
use crate::sync::protocol::{notebook_topic, CollabMessage, NoteUpdate, NotebookInvite};
use crate::sync::session::{CollabSession, RemoteUpdateHandler};
use crate::transport::Messenger;
use crate::types::{Contact, NoteSnapshot, NotebookId, NotebookRecord};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Writes applied remote updates into the note store and fans the result
/// out to event subscribers.
struct StoreUpdateSink {
    store: Arc<dyn NoteStore>,
    event_tx: broadcast::Sender<CollabEvent>,
}

#[async_trait]
impl RemoteUpdateHandler for StoreUpdateSink {
    async fn on_remote_update(&self, update: NoteUpdate) -> CollabResult<()> {
        self.store.upsert_note(update.to_snapshot()).await?;
        let _ = self.event_tx.send(CollabEvent::RemoteNoteApplied { update });
        Ok(())
    }
}

/// Owns collaboration state for one local identity.
pub struct CollabController {
    messenger: Arc<dyn Messenger>,
    store: Arc<dyn NoteStore>,
    resolver: ContactResolver,
    /// Display name stamped on outgoing invites.
    display_name: Option<String>,
    contacts: RwLock<Vec<Contact>>,
    session: Arc<RwLock<Option<Arc<CollabSession>>>>,
    status: RwLock<CollabStatus>,
    topic: RwLock<Option<String>>,
    pending_invite: Arc<RwLock<Option<NotebookInvite>>>,
    event_tx: broadcast::Sender<CollabEvent>,
    op_seq: AtomicU64,
    invite_listener: Mutex<Option<JoinHandle<()>>>,
}

impl CollabController {
    /// Build a controller and start its invite listener.
    ///
    /// When the global subscription cannot be established the controller
    /// still works for outgoing collaboration; it just never learns about
    /// incoming invites, and says so in the log.
    pub async fn new(
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn NoteStore>,
        alias_resolver: Arc<dyn AliasResolver>,
        display_name: Option<String>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let controller = Self {
            resolver: ContactResolver::new(alias_resolver),
            messenger,
            store,
            display_name,
            contacts: RwLock::new(Vec::new()),
            session: Arc::new(RwLock::new(None)),
            status: RwLock::new(CollabStatus::Idle),
            topic: RwLock::new(None),
            pending_invite: Arc::new(RwLock::new(None)),
            event_tx,
            op_seq: AtomicU64::new(0),
            invite_listener: Mutex::new(None),
        };
        let listener = controller.spawn_invite_listener().await;
        *controller.invite_listener.lock() = listener;
        controller
    }

    /// Subscribe to controller events. Safe to call any number of times.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CollabEvent> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> CollabStatus {
        self.status.read().clone()
    }

    /// Message of the last failed start, if the controller is in the
    /// error state.
    pub fn last_error(&self) -> Option<String> {
        self.status.read().error_message().map(str::to_string)
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.read().clone()
    }

    pub fn pending_invite(&self) -> Option<NotebookInvite> {
        self.pending_invite.read().clone()
    }

    /// Topic of the notebook currently being collaborated on.
    pub fn active_topic(&self) -> Option<String> {
        self.topic.read().clone()
    }

    /// Resolve input to a contact and add it to the list.
    ///
    /// Identical addresses (any casing, alias or not) collapse to one
    /// entry; re-adding returns the existing contact. Unlike session
    /// start, this path fails closed: a contact the transport cannot
    /// confirm as messageable is rejected, and so is a failed check.
    pub async fn add_contact(&self, input: &str) -> CollabResult<Contact> {
        let contact = self.resolver.resolve(input).await?;

        if let Some(existing) = self
            .contacts
            .read()
            .iter()
            .find(|c| c.address == contact.address)
        {
            debug!(peer = %contact.address, "contact already in the list");
            return Ok(existing.clone());
        }

        let reachable = self
            .messenger
            .reachable(std::slice::from_ref(&contact.address))
            .await?;
        if !reachable.get(&contact.address).copied().unwrap_or(false) {
            return Err(CollabError::ContactUnreachable(contact.address.clone()));
        }

        {
            let mut contacts = self.contacts.write();
            if contacts.iter().any(|c| c.address == contact.address) {
                return Ok(contact);
            }
            contacts.push(contact.clone());
        }
        info!(peer = %contact.address, "contact added");
        let _ = self.event_tx.send(CollabEvent::ContactAdded {
            contact: contact.clone(),
        });
        Ok(contact)
    }

    /// Remove a contact by address, case-insensitively. Returns whether
    /// anything was removed.
    pub fn remove_contact(&self, address: &str) -> bool {
        let removed = {
            let mut contacts = self.contacts.write();
            contacts
                .iter()
                .position(|c| c.address.matches(address))
                .map(|index| contacts.remove(index))
        };
        match removed {
            Some(contact) => {
                info!(peer = %contact.address, "contact removed");
                let _ = self.event_tx.send(CollabEvent::ContactRemoved {
                    address: contact.address,
                });
                true
            }
            None => {
                debug!(peer = address, "no such contact");
                false
            }
        }
    }

    /// Share a notebook with the current contact list.
    ///
    /// Runs the full start sequence: build a session, invite every
    /// reachable contact, persist the derived topic, then go active. On
    /// any failure the session is torn down and the status carries the
    /// error so the UI can show it. Contacts and notebook data are never
    /// touched by a failure.
    pub async fn start_collaboration(
        &self,
        notebook_id: &NotebookId,
        notebook_name: &str,
    ) -> CollabResult<()> {
        if notebook_id.is_empty() {
            return Err(CollabError::InvalidOperation(
                "a notebook id is required to start collaboration".to_string(),
            ));
        }
        let seq = self.begin_operation();
        self.set_status(CollabStatus::Starting);
        info!(notebook = %notebook_id, "starting collaboration");

        let session = self.build_session(notebook_id.clone());
        let contacts = self.contacts.read().clone();
        if let Err(e) = session.start(&contacts, notebook_name).await {
            self.fail_start(seq, &session, &e);
            return Err(e);
        }

        let topic = notebook_topic(notebook_id);
        if let Err(e) = self.store.update_notebook_topic(notebook_id, &topic).await {
            self.fail_start(seq, &session, &e);
            return Err(e);
        }

        self.commit_active(seq, session, topic);
        Ok(())
    }

    /// Accept the pending invite, if any.
    ///
    /// Adds the inviter as a contact, starts a session with them as the
    /// sole collaborator, and makes sure the notebook exists locally:
    /// existing notebooks get the topic persisted, unknown ones get a
    /// replica row named after the invite.
    pub async fn accept_invite(&self) -> CollabResult<()> {
        let invite = match self.pending_invite.write().take() {
            Some(invite) => invite,
            None => {
                debug!("accept called with no pending invite");
                return Ok(());
            }
        };
        info!(
            notebook = %invite.notebook_id,
            from = %invite.inviter_address,
            "accepting collaboration invite"
        );

        let mut inviter = Contact::new(invite.inviter_address.clone());
        if let Some(name) = &invite.inviter_name {
            inviter = inviter.with_label(name.clone());
        }
        self.add_known_contact(inviter.clone());

        let seq = self.begin_operation();
        self.set_status(CollabStatus::Starting);

        let session = self.build_session(invite.notebook_id.clone());
        if let Err(e) = session
            .start(std::slice::from_ref(&inviter), &invite.notebook_name)
            .await
        {
            self.fail_start(seq, &session, &e);
            return Err(e);
        }

        let topic = notebook_topic(&invite.notebook_id);
        let persisted = match self.store.get_notebook(&invite.notebook_id).await {
            Ok(Some(_)) => {
                self.store
                    .update_notebook_topic(&invite.notebook_id, &topic)
                    .await
            }
            Ok(None) => {
                debug!(notebook = %invite.notebook_id, "creating local replica notebook");
                self.store
                    .create_replica_notebook(NotebookRecord::replica(
                        invite.notebook_id.clone(),
                        invite.notebook_name.clone(),
                        topic.clone(),
                    ))
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = persisted {
            self.fail_start(seq, &session, &e);
            return Err(e);
        }

        self.commit_active(seq, session, topic);
        Ok(())
    }

    /// Dismiss the pending invite without any side effects.
    pub fn reject_invite(&self) {
        if self.pending_invite.write().take().is_some() {
            debug!("collaboration invite dismissed");
        }
    }

    /// Stop the active session and return to idle. Always succeeds.
    pub fn stop_collaboration(&self) {
        self.begin_operation();
        let session = self.session.write().take();
        let had_session = session.is_some();
        if let Some(session) = session {
            session.stop();
        }
        *self.topic.write() = None;
        self.set_status(CollabStatus::Idle);
        if had_session {
            info!("collaboration stopped");
        }
    }

    /// Fan a local note edit out to collaborators. A no-op unless the
    /// controller is active.
    pub async fn broadcast_local_update(&self, note: &NoteSnapshot) {
        let session = {
            if !self.status.read().is_active() {
                debug!(note = %note.id, "collaboration not active; edit stays local");
                return;
            }
            self.session.read().clone()
        };
        if let Some(session) = session {
            session.broadcast(note).await;
        }
    }

    /// Stop everything, including the invite listener. The controller is
    /// inert afterwards.
    pub fn shutdown(&self) {
        self.stop_collaboration();
        if let Some(listener) = self.invite_listener.lock().take() {
            listener.abort();
        }
        debug!("collaboration controller shut down");
    }

    fn build_session(&self, notebook_id: NotebookId) -> Arc<CollabSession> {
        let sink = Arc::new(StoreUpdateSink {
            store: Arc::clone(&self.store),
            event_tx: self.event_tx.clone(),
        });
        let mut session = CollabSession::new(notebook_id, Arc::clone(&self.messenger), sink);
        if let Some(name) = &self.display_name {
            session = session.with_inviter_name(name.clone());
        }
        Arc::new(session)
    }

    /// Add a contact that arrived through an invite. No reachability
    /// gate: the peer has just proven it can message us.
    fn add_known_contact(&self, contact: Contact) {
        {
            let mut contacts = self.contacts.write();
            if contacts.iter().any(|c| c.address == contact.address) {
                return;
            }
            contacts.push(contact.clone());
        }
        info!(peer = %contact.address, "contact added from invite");
        let _ = self.event_tx.send(CollabEvent::ContactAdded { contact });
    }

    fn begin_operation(&self) -> u64 {
        self.op_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn operation_current(&self, seq: u64) -> bool {
        self.op_seq.load(Ordering::SeqCst) == seq
    }

    /// Final commit of a started session. Returns false when a newer
    /// operation superseded this one, in which case the session is
    /// stopped instead of committed.
    fn commit_active(&self, seq: u64, session: Arc<CollabSession>, topic: String) -> bool {
        let previous = {
            let mut slot = self.session.write();
            if !self.operation_current(seq) {
                drop(slot);
                debug!("start outcome superseded; discarding session");
                session.stop();
                return false;
            }
            slot.replace(session)
        };
        if let Some(previous) = previous {
            previous.stop();
        }
        *self.topic.write() = Some(topic);
        self.set_status(CollabStatus::Active);
        info!("collaboration active");
        true
    }

    fn fail_start(&self, seq: u64, session: &CollabSession, error: &CollabError) {
        session.stop();
        if self.operation_current(seq) {
            warn!(error = %error, "collaboration start failed");
            self.set_status(CollabStatus::Error(error.to_string()));
        }
    }

    fn set_status(&self, status: CollabStatus) {
        let changed = {
            let mut current = self.status.write();
            if *current == status {
                false
            } else {
                debug!(from = %current, to = %status, "collaboration status changed");
                *current = status.clone();
                true
            }
        };
        if changed {
            let _ = self.event_tx.send(CollabEvent::StatusChanged { status });
        }
    }

    /// Watch the global incoming stream for invites.
    ///
    /// Everything that is not an invite is skipped: session channels own
    /// crdt-update traffic, and undecodable content is chatter from other
    /// applications sharing the messaging layer. An invite is also skipped
    /// when it is self-authored, when it names the notebook of the active
    /// session, or when another invite is already waiting on the user.
    async fn spawn_invite_listener(&self) -> Option<JoinHandle<()>> {
        let stream = match self.messenger.subscribe_all().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    error = %e,
                    "cannot watch incoming messages; invites will not be detected"
                );
                return None;
            }
        };
        let local_identity = self.messenger.local_identity();
        let session = Arc::clone(&self.session);
        let pending = Arc::clone(&self.pending_invite);
        let event_tx = self.event_tx.clone();

        Some(tokio::spawn(async move {
            let mut stream = stream;
            debug!("invite listener started");
            while let Some(message) = stream.next().await {
                if message.sender == local_identity {
                    continue;
                }
                let invite = match CollabMessage::decode(&message.content) {
                    Ok(CollabMessage::Invite(invite)) => invite,
                    Ok(CollabMessage::CrdtUpdate(_)) | Err(_) => continue,
                };
                let active = session.read().as_ref().map(|s| s.notebook_id().clone());
                if active.as_ref() == Some(&invite.notebook_id) {
                    debug!(
                        notebook = %invite.notebook_id,
                        "invite for the active session; ignoring"
                    );
                    continue;
                }
                {
                    let mut pending = pending.write();
                    if pending.is_some() {
                        debug!(
                            notebook = %invite.notebook_id,
                            "an invite is already pending; ignoring"
                        );
                        continue;
                    }
                    *pending = Some(invite.clone());
                }
                info!(
                    notebook = %invite.notebook_id,
                    from = %invite.inviter_address,
                    "collaboration invite received"
                );
                let _ = event_tx.send(CollabEvent::InviteReceived { invite });
            }
            debug!("invite listener ended");
        }))
    }
}
