//! Error types for the Convey node and stores.
//!
//! Message text on the user-facing variants is load-bearing: clients
//! and tests match on it, so it stays stable.

use thiserror::Error;

/// Errors surfaced by the node, stores, ledger, and digest.
#[derive(Debug, Error)]
pub enum ConveyError {
    /// The conversation hash matched nothing on the conversation chain.
    #[error("No such conversation: {0}")]
    NoSuchConversation(String),

    /// An alias already has key material in the keystore.
    #[error("Key already exists: {0}")]
    KeyAlreadyExists(String),

    /// Wrong password, missing key, or failed decryption. Opaque.
    #[error("Access denied")]
    AccessDenied,

    /// A channel name the node has not opened.
    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("chain error: {0}")]
    Chain(#[from] convey_chain::ChainError),

    #[error("cache error: {0}")]
    Cache(#[from] convey_cache::CacheError),

    #[error("network error: {0}")]
    Network(#[from] convey_net::NetError),

    #[error("decoding error: {0}")]
    Core(#[from] convey_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for node and store operations.
pub type Result<T> = std::result::Result<T, ConveyError>;
