//! The node: an identity plus its channels, cache, and peers.
//!
//! A node owns one keypair and a set of open channels. Every channel
//! sits behind its own async mutex, so updates on different channels
//! proceed independently while a single channel's head can only be
//! advanced by one task at a time.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::debug;

use convey_cache::Cache;
use convey_chain::{mine_block, Channel, ChainError, ChainIter, MiningListener};
use convey_core::{
    Block, BlockEntry, BlockHash, ChannelHead, Keypair, Record, RecordHash, X25519PublicKey,
};
use convey_net::Network;

use crate::error::{ConveyError, Result};

/// Current Unix time in seconds.
pub fn timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}

/// A Convey node.
pub struct Node {
    alias: String,
    keypair: Keypair,
    cache: Arc<dyn Cache>,
    network: Option<Arc<dyn Network>>,
    channels: RwLock<HashMap<String, Arc<Mutex<Channel>>>>,
}

impl Node {
    pub fn new(
        alias: impl Into<String>,
        keypair: Keypair,
        cache: Arc<dyn Cache>,
        network: Option<Arc<dyn Network>>,
    ) -> Self {
        Self {
            alias: alias.into(),
            keypair,
            cache,
            network,
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    pub fn network(&self) -> Option<&dyn Network> {
        self.network.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Channels
    // ─────────────────────────────────────────────────────────────────────

    /// Register a channel and return its handle. Re-adding a name
    /// returns the existing handle.
    pub fn add_channel(&self, channel: Channel) -> Arc<Mutex<Channel>> {
        let mut channels = self.channels.write().unwrap();
        channels
            .entry(channel.name().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(channel)))
            .clone()
    }

    /// Look up an open channel by name.
    pub fn channel(&self, name: &str) -> Result<Arc<Mutex<Channel>>> {
        let channels = self.channels.read().unwrap();
        channels
            .get(name)
            .cloned()
            .ok_or_else(|| ConveyError::NoSuchChannel(name.to_string()))
    }

    /// Names of all open channels.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.read().unwrap().keys().cloned().collect()
    }

    /// Snapshot of every channel's head.
    pub async fn channel_heads(&self) -> Vec<(String, Option<BlockHash>)> {
        let handles: Vec<(String, Arc<Mutex<Channel>>)> = {
            let channels = self.channels.read().unwrap();
            channels
                .iter()
                .map(|(name, handle)| (name.clone(), handle.clone()))
                .collect()
        };

        let mut heads = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let head = handle.lock().await.head();
            heads.push((name, head));
        }
        heads
    }

    // ─────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────

    /// Queue a record for a channel's next block.
    pub async fn write_record(&self, channel_name: &str, record: Record) -> Result<RecordHash> {
        let entry = BlockEntry::from_record(record);
        let hash = entry.record_hash;
        self.cache.put_entry(channel_name, &entry).await?;
        Ok(hash)
    }

    /// Create, sign, and queue a record authored by this node.
    ///
    /// A non-empty access list seals the payload for those recipients.
    pub async fn write(
        &self,
        timestamp: u64,
        channel_name: &str,
        acl: &[(String, X25519PublicKey)],
        payload: &[u8],
    ) -> Result<RecordHash> {
        let record = if acl.is_empty() {
            Record::sign(timestamp, &self.alias, payload.to_vec(), &self.keypair)
        } else {
            Record::sign_sealed(timestamp, &self.alias, payload, acl, &self.keypair)?
        };
        self.write_record(channel_name, record).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mining
    // ─────────────────────────────────────────────────────────────────────

    /// Seal the channel's pending entries into a new block.
    ///
    /// Collects pending entries, searches a nonce at the given threshold,
    /// and advances the channel head. Sealed entries are removed from the
    /// pending queue only after the head advances.
    pub async fn mine(
        &self,
        channel: &Arc<Mutex<Channel>>,
        threshold: u32,
        listener: &dyn MiningListener,
    ) -> Result<(BlockHash, Block)> {
        let mut channel = channel.lock().await;
        let name = channel.name().to_string();

        let entries = self.cache.pending_entries(&name).await?;
        if entries.is_empty() {
            return Err(ChainError::NothingToMine(name).into());
        }

        let sealed: Vec<RecordHash> = entries.iter().map(|e| e.record_hash).collect();
        let (hash, block) = self
            .mine_entries(&mut channel, threshold, listener, entries)
            .await?;

        self.cache.remove_entries(&name, &sealed).await?;
        Ok((hash, block))
    }

    /// Mine a block from explicit entries, bypassing the pending queue.
    ///
    /// Periodic validation blocks are produced this way: they may carry
    /// zero entries when no other chains have heads yet.
    pub async fn mine_block(
        &self,
        channel: &Arc<Mutex<Channel>>,
        threshold: u32,
        listener: &dyn MiningListener,
        entries: Vec<BlockEntry>,
    ) -> Result<(BlockHash, Block)> {
        let mut channel = channel.lock().await;
        self.mine_entries(&mut channel, threshold, listener, entries)
            .await
    }

    async fn mine_entries(
        &self,
        channel: &mut Channel,
        threshold: u32,
        listener: &dyn MiningListener,
        entries: Vec<BlockEntry>,
    ) -> Result<(BlockHash, Block)> {
        let block = Block {
            channel_name: channel.name().to_string(),
            timestamp: timestamp(),
            miner: self.alias.clone(),
            prior_hash: channel.head(),
            entries,
            nonce: 0,
        };

        let (hash, block) = mine_block(block, threshold, listener)?;
        channel
            .update(self.cache.as_ref(), self.network(), hash, &block)
            .await?;

        debug!(channel = channel.name(), hash = %hash, "mined block");
        Ok((hash, block))
    }

    /// Mine a periodic validation block: one entry per known channel
    /// head, signed by this node.
    pub async fn mine_periodic_validation(
        &self,
        channel: &Arc<Mutex<Channel>>,
        threshold: u32,
        listener: &dyn MiningListener,
    ) -> Result<(BlockHash, Block)> {
        let now = timestamp();
        let mut entries = Vec::new();
        for (name, head) in self.channel_heads().await {
            if let Some(head) = head {
                let payload = ChannelHead {
                    channel: name,
                    head,
                };
                let record = Record::sign(now, &self.alias, payload.to_bytes(), &self.keypair);
                entries.push(BlockEntry::from_record(record));
            }
        }

        self.mine_block(channel, threshold, listener, entries).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Walk a channel backward, handing each readable payload to the
    /// callback.
    ///
    /// Sealed records this node cannot open are skipped. The callback
    /// breaks to stop early.
    pub async fn read_payloads(
        &self,
        channel: &Arc<Mutex<Channel>>,
        callback: &mut (dyn FnMut(&BlockEntry, &[u8]) -> ControlFlow<()> + Send),
    ) -> Result<()> {
        let (name, head) = {
            let channel = channel.lock().await;
            (channel.name().to_string(), channel.head())
        };

        let mut iter = ChainIter::new(&name, head, self.cache.as_ref(), self.network());
        while let Some((_, block)) = iter.next().await? {
            for entry in &block.entries {
                let payload = match entry.record.unwrap_payload(&self.alias, &self.keypair) {
                    Ok(payload) => payload,
                    Err(_) => continue,
                };
                if let ControlFlow::Break(()) = callback(entry, &payload) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
