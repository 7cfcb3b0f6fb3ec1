//! Cache trait: the abstract interface for block and entry persistence.
//!
//! The cache is an opaque store keyed by channel name and content hash.
//! Because every key is a content address, writes are idempotent and a
//! partial write can never corrupt unrelated data.

use async_trait::async_trait;
use convey_core::{Block, BlockEntry, BlockHash, RecordHash};

use crate::error::Result;

/// The Cache trait: async interface for block and entry persistence.
///
/// # Design Notes
///
/// - **Content addressing**: blocks are keyed by (channel, block hash),
///   entries by (channel, record hash). Re-putting identical content is
///   a no-op.
/// - **Pending entries**: records submitted for a channel wait here until
///   mining seals them into a block, at which point the miner removes
///   exactly the hashes it sealed.
/// - **Heads**: one head pointer per channel, overwritten on advance.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a block by its content address.
    async fn get_block(&self, channel: &str, hash: &BlockHash) -> Result<Option<Block>>;

    /// Store a block under its content address.
    async fn put_block(&self, channel: &str, hash: &BlockHash, block: &Block) -> Result<()>;

    /// Get the cached head of a channel.
    async fn get_head(&self, channel: &str) -> Result<Option<BlockHash>>;

    /// Advance the cached head of a channel.
    async fn put_head(&self, channel: &str, head: &BlockHash) -> Result<()>;

    /// Queue a record entry for the channel's next block.
    async fn put_entry(&self, channel: &str, entry: &BlockEntry) -> Result<()>;

    /// All entries queued for a channel, in insertion order.
    async fn pending_entries(&self, channel: &str) -> Result<Vec<BlockEntry>>;

    /// Remove queued entries that have been sealed into a block.
    async fn remove_entries(&self, channel: &str, hashes: &[RecordHash]) -> Result<()>;
}
