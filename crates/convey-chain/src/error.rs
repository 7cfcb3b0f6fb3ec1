//! Error types for the chain module.

use thiserror::Error;

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The mining listener requested an abort.
    #[error("mining aborted")]
    MiningAborted,

    /// Requested threshold exceeds the hash width.
    #[error("threshold too high: {0} exceeds 256 bits")]
    ThresholdTooHigh(u32),

    /// No pending entries to seal into a block.
    #[error("nothing to mine for channel: {0}")]
    NothingToMine(String),

    /// A block's hash does not carry enough leading zero bits.
    #[error("hash {hash} does not meet threshold {threshold}")]
    ThresholdNotMet { hash: String, threshold: u32 },

    /// A candidate hash does not match the block content.
    #[error("hash mismatch: announced {announced}, computed {computed}")]
    HashMismatch { announced: String, computed: String },

    /// A block arrived on the wrong channel.
    #[error("block belongs to channel {got}, expected {expected}")]
    WrongChannel { expected: String, got: String },

    /// A referenced block is in neither the cache nor any peer.
    #[error("block not found: {0}")]
    BlockNotFound(String),

    /// A validator rejected the block. The message is surfaced verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("cache error: {0}")]
    Cache(#[from] convey_cache::CacheError),

    #[error("network error: {0}")]
    Network(#[from] convey_net::NetError),

    #[error("decoding error: {0}")]
    Decoding(#[from] convey_core::CoreError),
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
