//! Error types for the Quillsync collaboration engine

use thiserror::Error;

use crate::types::Address;

/// Main error type for collaboration operations
#[derive(Error, Debug)]
pub enum CollabError {
    /// Input is neither a wallet address nor a name-service alias
    #[error("Invalid contact: {0}")]
    InvalidContact(String),

    /// Alias lookup failed or the alias has no registered address
    #[error("Could not resolve '{input}': {reason}")]
    ResolutionFailed { input: String, reason: String },

    /// The contact has no messageable identity on the transport
    #[error("Contact is not reachable: {0}")]
    ContactUnreachable(Address),

    /// Channel creation or invite delivery failed while starting a session
    #[error("Failed to start collaboration: {0}")]
    SessionStart(String),

    /// Transport-level failure (send, subscribe, reachability check)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local note store failure
    #[error("Store error: {0}")]
    Store(String),

    /// A wire message could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation is not valid in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type alias for collaboration operations
pub type CollabResult<T> = Result<T, CollabError>;
