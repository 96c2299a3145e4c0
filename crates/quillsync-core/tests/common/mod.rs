//! Shared test infrastructure: an in-memory messaging hub and note store.
//!
//! The hub stands in for the wallet messaging layer. It routes messages
//! between registered clients the way the real transport does, including
//! the warts the engine has to tolerate: senders see their own messages
//! echoed back on channels and on the global stream, and per-address
//! failures can be injected for reachability, channel creation, and send.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::time::Instant;

use quillsync_core::{
    Address, Channel, ChannelMessage, CollabError, CollabResult, MessageStream, Messenger,
    NoteId, NoteSnapshot, NoteStore, NotebookId, NotebookRecord, SenderId,
};

pub const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const CAROL: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

pub fn addr(value: &str) -> Address {
    Address::parse(value).unwrap()
}

/// Route engine logs to the test output. Honors RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Poll until the condition holds or the deadline passes.
pub async fn wait_until(millis: u64, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(millis);
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// One message as the hub routed it.
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub from: Address,
    pub to: Address,
    pub content: String,
}

impl SentRecord {
    pub fn is_invite(&self) -> bool {
        self.content.contains("\"type\":\"invite\"")
    }

    pub fn is_update(&self) -> bool {
        self.content.contains("\"type\":\"crdt-update\"")
    }
}

type Subscribers = Vec<UnboundedSender<ChannelMessage>>;

#[derive(Default)]
struct ClientState {
    global: Subscribers,
    /// Subscribers to the pairwise link with a given remote peer.
    per_peer: HashMap<Address, Subscribers>,
}

impl ClientState {
    fn deliver(&mut self, link_peer: &Address, message: &ChannelMessage) {
        if let Some(subs) = self.per_peer.get_mut(link_peer) {
            subs.retain(|tx| tx.unbounded_send(message.clone()).is_ok());
        }
        self.global
            .retain(|tx| tx.unbounded_send(message.clone()).is_ok());
    }
}

#[derive(Default)]
struct HubInner {
    clients: Mutex<HashMap<Address, ClientState>>,
    reachability: Mutex<HashMap<Address, bool>>,
    fail_reachability: AtomicBool,
    fail_open: Mutex<HashSet<Address>>,
    fail_send_to: Mutex<HashSet<Address>>,
    fail_subscribe_all: AtomicBool,
    open_delay_ms: AtomicU64,
    log: Mutex<Vec<SentRecord>>,
}

/// In-memory messaging fabric connecting any number of test clients.
#[derive(Clone, Default)]
pub struct MessageHub {
    inner: Arc<HubInner>,
}

impl MessageHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Its address becomes reachable by default.
    pub fn client(&self, address: &str, identity: &str) -> Arc<HubMessenger> {
        let address = addr(address);
        let identity = SenderId::new(identity);
        self.inner
            .clients
            .lock()
            .insert(address.clone(), ClientState::default());
        self.inner
            .reachability
            .lock()
            .insert(address.clone(), true);
        Arc::new(HubMessenger {
            hub: Arc::clone(&self.inner),
            address,
            identity,
        })
    }

    pub fn set_reachable(&self, address: &str, reachable: bool) {
        self.inner
            .reachability
            .lock()
            .insert(addr(address), reachable);
    }

    /// Remove the address from reachability answers entirely.
    pub fn forget_reachability(&self, address: &str) {
        self.inner.reachability.lock().remove(&addr(address));
    }

    /// Make every reachability check fail with a transport error.
    pub fn fail_reachability(&self, fail: bool) {
        self.inner.fail_reachability.store(fail, Ordering::SeqCst);
    }

    pub fn fail_open_to(&self, address: &str, fail: bool) {
        let mut set = self.inner.fail_open.lock();
        if fail {
            set.insert(addr(address));
        } else {
            set.remove(&addr(address));
        }
    }

    pub fn fail_send_to(&self, address: &str, fail: bool) {
        let mut set = self.inner.fail_send_to.lock();
        if fail {
            set.insert(addr(address));
        } else {
            set.remove(&addr(address));
        }
    }

    pub fn fail_subscribe_all(&self, fail: bool) {
        self.inner.fail_subscribe_all.store(fail, Ordering::SeqCst);
    }

    /// Delay channel creation, for racing stops against slow starts.
    pub fn set_open_delay(&self, millis: u64) {
        self.inner.open_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.inner.log.lock().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentRecord> {
        let to = addr(address);
        self.sent().into_iter().filter(|r| r.to == to).collect()
    }

    pub fn invites_sent(&self) -> Vec<SentRecord> {
        self.sent().into_iter().filter(SentRecord::is_invite).collect()
    }

    pub fn updates_sent(&self) -> Vec<SentRecord> {
        self.sent().into_iter().filter(SentRecord::is_update).collect()
    }

    pub fn clear_log(&self) {
        self.inner.log.lock().clear();
    }
}

/// A registered client's view of the hub.
pub struct HubMessenger {
    hub: Arc<HubInner>,
    address: Address,
    identity: SenderId,
}

#[async_trait]
impl Messenger for HubMessenger {
    fn local_identity(&self) -> SenderId {
        self.identity.clone()
    }

    fn local_address(&self) -> Address {
        self.address.clone()
    }

    async fn reachable(&self, addresses: &[Address]) -> CollabResult<HashMap<Address, bool>> {
        if self.hub.fail_reachability.load(Ordering::SeqCst) {
            return Err(CollabError::Transport(
                "reachability check failed".to_string(),
            ));
        }
        let table = self.hub.reachability.lock();
        Ok(addresses
            .iter()
            .filter_map(|a| table.get(a).map(|ok| (a.clone(), *ok)))
            .collect())
    }

    async fn open_channel(&self, address: &Address) -> CollabResult<Arc<dyn Channel>> {
        let delay = self.hub.open_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.hub.fail_open.lock().contains(address) {
            return Err(CollabError::Transport(format!(
                "cannot open channel to {address}"
            )));
        }
        if !self.hub.clients.lock().contains_key(address) {
            return Err(CollabError::Transport(format!("unknown peer {address}")));
        }
        Ok(Arc::new(HubChannel {
            hub: Arc::clone(&self.hub),
            owner: self.address.clone(),
            owner_identity: self.identity.clone(),
            peer: address.clone(),
        }))
    }

    async fn subscribe_all(&self) -> CollabResult<MessageStream> {
        if self.hub.fail_subscribe_all.load(Ordering::SeqCst) {
            return Err(CollabError::Transport("inbox unavailable".to_string()));
        }
        let (tx, rx) = unbounded();
        self.hub
            .clients
            .lock()
            .get_mut(&self.address)
            .expect("client registered")
            .global
            .push(tx);
        Ok(rx.boxed())
    }
}

/// One end of a pairwise link between two clients.
pub struct HubChannel {
    hub: Arc<HubInner>,
    owner: Address,
    owner_identity: SenderId,
    peer: Address,
}

#[async_trait]
impl Channel for HubChannel {
    fn peer(&self) -> &Address {
        &self.peer
    }

    async fn send(&self, message: &str) -> CollabResult<()> {
        if self.hub.fail_send_to.lock().contains(&self.peer) {
            return Err(CollabError::Transport(format!(
                "send to {} failed",
                self.peer
            )));
        }
        self.hub.log.lock().push(SentRecord {
            from: self.owner.clone(),
            to: self.peer.clone(),
            content: message.to_string(),
        });

        let delivered = ChannelMessage {
            sender: self.owner_identity.clone(),
            content: message.to_string(),
        };
        let mut clients = self.hub.clients.lock();
        // the receiving side sees it on their link back to us
        if let Some(receiver) = clients.get_mut(&self.peer) {
            receiver.deliver(&self.owner, &delivered);
        }
        // and the transport echoes our own message back to us
        if let Some(sender) = clients.get_mut(&self.owner) {
            sender.deliver(&self.peer, &delivered);
        }
        Ok(())
    }

    async fn subscribe(&self) -> CollabResult<MessageStream> {
        let (tx, rx) = unbounded();
        self.hub
            .clients
            .lock()
            .get_mut(&self.owner)
            .expect("client registered")
            .per_peer
            .entry(self.peer.clone())
            .or_default()
            .push(tx);
        Ok(rx.boxed())
    }
}

/// In-memory `NoteStore` with injectable write failures.
#[derive(Default)]
pub struct MemoryStore {
    notes: Mutex<HashMap<NoteId, NoteSnapshot>>,
    notebooks: Mutex<HashMap<NotebookId, NotebookRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_notebook(&self, record: NotebookRecord) {
        self.notebooks.lock().insert(record.id.clone(), record);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn note(&self, id: &NoteId) -> Option<NoteSnapshot> {
        self.notes.lock().get(id).cloned()
    }

    pub fn notebook(&self, id: &NotebookId) -> Option<NotebookRecord> {
        self.notebooks.lock().get(id).cloned()
    }

    pub fn notes_count(&self) -> usize {
        self.notes.lock().len()
    }

    pub fn notebooks_count(&self) -> usize {
        self.notebooks.lock().len()
    }

    fn check_writable(&self) -> CollabResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CollabError::Store("write failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn upsert_note(&self, note: NoteSnapshot) -> CollabResult<()> {
        self.check_writable()?;
        self.notes.lock().insert(note.id.clone(), note);
        Ok(())
    }

    async fn update_notebook_topic(
        &self,
        notebook_id: &NotebookId,
        topic: &str,
    ) -> CollabResult<()> {
        self.check_writable()?;
        let mut notebooks = self.notebooks.lock();
        match notebooks.get_mut(notebook_id) {
            Some(record) => {
                record.topic = Some(topic.to_string());
                Ok(())
            }
            None => Err(CollabError::Store(format!(
                "notebook {notebook_id} not found"
            ))),
        }
    }

    async fn create_replica_notebook(&self, record: NotebookRecord) -> CollabResult<()> {
        self.check_writable()?;
        self.notebooks.lock().insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_notebook(&self, notebook_id: &NotebookId) -> CollabResult<Option<NotebookRecord>> {
        Ok(self.notebooks.lock().get(notebook_id).cloned())
    }
}

/// Build a plain notebook row for seeding stores.
pub fn notebook_record(id: &str, name: &str) -> NotebookRecord {
    NotebookRecord {
        id: NotebookId::from(id),
        name: name.to_string(),
        created_at: 1_700_000_000_000,
        updated_at: 1_700_000_000_000,
        topic: None,
    }
}

/// Build a note snapshot for broadcasting.
pub fn note(notebook: &str, id: &str, title: &str, content: &str) -> NoteSnapshot {
    NoteSnapshot {
        id: NoteId::from(id),
        notebook_id: NotebookId::from(notebook),
        title: title.to_string(),
        content: content.to_string(),
        updated_at: 1_700_000_000_000,
    }
}
