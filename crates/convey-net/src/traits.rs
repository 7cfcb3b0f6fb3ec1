//! Network trait: how a node exchanges chain state with its peers.
//!
//! Convey has no global consensus; a node pulls a channel's remote head
//! and the blocks behind it, and pushes its own head and blocks out.
//! Transport choice, peering, and timeouts all live behind this trait.

use async_trait::async_trait;
use convey_core::{Block, BlockHash};

use crate::error::Result;

/// Transport seam between a node and its peers.
///
/// Implementations must be thread-safe. Operations inherit whatever
/// timeout discipline the transport has; the chain layer imposes none of
/// its own.
#[async_trait]
pub trait Network: Send + Sync {
    /// The best head any peer advertises for a channel.
    async fn fetch_head(&self, channel: &str) -> Result<Option<BlockHash>>;

    /// Fetch a block by content address from peers.
    async fn fetch_block(&self, channel: &str, hash: &BlockHash) -> Result<Option<Block>>;

    /// Whether peers already know a block. Used to bound pushes.
    async fn has_block(&self, channel: &str, hash: &BlockHash) -> Result<bool>;

    /// Upload a block to peers.
    async fn announce_block(&self, channel: &str, hash: &BlockHash, block: &Block) -> Result<()>;

    /// Advertise a new head for a channel.
    async fn announce_head(&self, channel: &str, head: &BlockHash) -> Result<()>;
}
