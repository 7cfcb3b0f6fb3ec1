//! In-memory network for testing.
//!
//! Models the peer set as a single shared hub: announcing publishes into
//! the hub, fetching reads from it. Multiple nodes sharing one hub see
//! each other's pushes, which is enough to exercise pull/push logic
//! without sockets.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use convey_core::{Block, BlockHash};

use crate::error::Result;
use crate::traits::Network;

#[derive(Default)]
struct ChannelState {
    head: Option<BlockHash>,
    blocks: HashMap<BlockHash, Block>,
}

/// A process-local peer hub.
///
/// Clone-cheap: clones share the same underlying state.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    channels: Arc<RwLock<HashMap<String, ChannelState>>>,
}

impl MemoryNetwork {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks the hub holds for a channel. Test helper.
    pub fn block_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().unwrap();
        channels.get(channel).map_or(0, |c| c.blocks.len())
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn fetch_head(&self, channel: &str) -> Result<Option<BlockHash>> {
        let channels = self.channels.read().unwrap();
        Ok(channels.get(channel).and_then(|c| c.head))
    }

    async fn fetch_block(&self, channel: &str, hash: &BlockHash) -> Result<Option<Block>> {
        let channels = self.channels.read().unwrap();
        Ok(channels
            .get(channel)
            .and_then(|c| c.blocks.get(hash))
            .cloned())
    }

    async fn has_block(&self, channel: &str, hash: &BlockHash) -> Result<bool> {
        let channels = self.channels.read().unwrap();
        Ok(channels
            .get(channel)
            .is_some_and(|c| c.blocks.contains_key(hash)))
    }

    async fn announce_block(&self, channel: &str, hash: &BlockHash, block: &Block) -> Result<()> {
        let mut channels = self.channels.write().unwrap();
        channels
            .entry(channel.to_string())
            .or_default()
            .blocks
            .insert(*hash, block.clone());
        Ok(())
    }

    async fn announce_head(&self, channel: &str, head: &BlockHash) -> Result<()> {
        let mut channels = self.channels.write().unwrap();
        channels.entry(channel.to_string()).or_default().head = Some(*head);
        Ok(())
    }
}
