//! In-memory implementation of the Cache trait.
//!
//! Used by tests and by ephemeral nodes that rebuild state from peers on
//! startup. Same semantics as the SQLite backend, no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use convey_core::{Block, BlockEntry, BlockHash, RecordHash};

use crate::error::Result;
use crate::traits::Cache;

/// In-memory cache. Thread-safe via RwLock; all data is lost on drop.
pub struct MemoryCache {
    inner: RwLock<MemoryCacheInner>,
}

#[derive(Default)]
struct MemoryCacheInner {
    /// Blocks indexed by (channel, block hash).
    blocks: HashMap<(String, BlockHash), Block>,

    /// Head pointer per channel.
    heads: HashMap<String, BlockHash>,

    /// Pending entries per channel, insertion order preserved.
    entries: HashMap<String, Vec<BlockEntry>>,
}

impl MemoryCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryCacheInner::default()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_block(&self, channel: &str, hash: &BlockHash) -> Result<Option<Block>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.blocks.get(&(channel.to_string(), *hash)).cloned())
    }

    async fn put_block(&self, channel: &str, hash: &BlockHash, block: &Block) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .blocks
            .insert((channel.to_string(), *hash), block.clone());
        Ok(())
    }

    async fn get_head(&self, channel: &str) -> Result<Option<BlockHash>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.heads.get(channel).copied())
    }

    async fn put_head(&self, channel: &str, head: &BlockHash) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.heads.insert(channel.to_string(), *head);
        Ok(())
    }

    async fn put_entry(&self, channel: &str, entry: &BlockEntry) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let entries = inner.entries.entry(channel.to_string()).or_default();

        // Content-addressed: the same record queued twice is one entry.
        if !entries.iter().any(|e| e.record_hash == entry.record_hash) {
            entries.push(entry.clone());
        }
        Ok(())
    }

    async fn pending_entries(&self, channel: &str) -> Result<Vec<BlockEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.entries.get(channel).cloned().unwrap_or_default())
    }

    async fn remove_entries(&self, channel: &str, hashes: &[RecordHash]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(entries) = inner.entries.get_mut(channel) {
            entries.retain(|e| !hashes.contains(&e.record_hash));
        }
        Ok(())
    }
}
