//! Messaging transport capability interface
//!
//! The engine never talks to the network directly. The host application
//! hands it a `Messenger` (the wallet-to-wallet messaging layer, already
//! authenticated) and the engine only opens channels, sends strings, and
//! consumes message streams. Everything here is object-safe so the host
//! can inject whatever implementation it has, including test doubles.
//!
//! Delivery expectations are deliberately weak: at-least-once delivery,
//! no ordering guarantee across notes, and a sender may see its own
//! messages echoed back on a channel it subscribes to. The sync layer is
//! built to tolerate all three.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::CollabResult;
use crate::types::{Address, SenderId};

/// One message delivered on a channel or on the global incoming stream.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Transport identity of whoever sent it, including ourselves.
    pub sender: SenderId,
    /// Raw UTF-8 payload.
    pub content: String,
}

/// Stream of incoming messages. Dropping it is the unsubscribe.
pub type MessageStream = BoxStream<'static, ChannelMessage>;

/// A pairwise encrypted channel to one contact.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Address of the contact on the other end.
    fn peer(&self) -> &Address;

    /// Send one serialized message.
    async fn send(&self, message: &str) -> CollabResult<()>;

    /// Subscribe to messages arriving on this channel.
    async fn subscribe(&self) -> CollabResult<MessageStream>;
}

/// The messaging layer itself.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Opaque identity of the local inbox. Compared against
    /// `ChannelMessage::sender` to filter self-authored traffic.
    fn local_identity(&self) -> SenderId;

    /// Wallet address the local identity is registered under.
    fn local_address(&self) -> Address;

    /// Which of the given addresses have a messageable identity.
    ///
    /// The result map may omit addresses the transport knows nothing
    /// about; callers treat a missing entry as unreachable.
    async fn reachable(&self, addresses: &[Address]) -> CollabResult<HashMap<Address, bool>>;

    /// Open the pairwise channel to a contact, reusing an existing one
    /// when the transport has it.
    async fn open_channel(&self, address: &Address) -> CollabResult<Arc<dyn Channel>>;

    /// Subscribe to every incoming message across all channels, existing
    /// and future. This is what the invite listener runs on.
    async fn subscribe_all(&self) -> CollabResult<MessageStream>;
}
