//! Channel: a named append-only proof-of-work chain.
//!
//! A channel tracks one head pointer and accepts a new head only after
//! re-checking the whole chain behind it: proof of work, prior-hash
//! linkage, and every registered validator. Heads advance forward only;
//! a pull that does not extend the local chain is ignored.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use convey_cache::Cache;
use convey_core::{leading_zero_bits, Block, BlockHash};
use convey_net::Network;

use crate::error::{ChainError, Result};
use crate::iter::{fetch_block, ChainIter};

/// A chain-level acceptance check.
///
/// Validators see the full chain from the candidate block backward; an
/// error rejects the candidate. Registering a validator after blocks
/// exist does not re-validate history.
#[async_trait]
pub trait BlockValidator: Send + Sync {
    async fn validate(
        &self,
        channel: &Channel,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
        hash: &BlockHash,
        block: &Block,
    ) -> Result<()>;
}

/// A named proof-of-work chain with a configured threshold.
pub struct Channel {
    name: String,
    threshold: u32,
    head: Option<BlockHash>,
    validators: Vec<Arc<dyn BlockValidator>>,
}

impl Channel {
    /// Open a channel with the given PoW threshold.
    pub fn new(name: impl Into<String>, threshold: u32) -> Self {
        Self {
            name: name.into(),
            threshold,
            head: None,
            validators: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn head(&self) -> Option<BlockHash> {
        self.head
    }

    /// Register a validator. Checks run on every subsequent acceptance.
    pub fn add_validator(&mut self, validator: Arc<dyn BlockValidator>) {
        self.validators.push(validator);
    }

    /// Set the head from the cache, if one was persisted.
    pub async fn load_cached_head(&mut self, cache: &dyn Cache) -> Result<()> {
        self.head = cache.get_head(&self.name).await?;
        Ok(())
    }

    /// Accept a candidate head.
    ///
    /// Verifies the candidate's content address, then walks the chain
    /// backward checking threshold and linkage, then runs validators.
    /// On success the block and head pointer are persisted and the
    /// in-memory head advances.
    pub async fn update(
        &mut self,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
        hash: BlockHash,
        block: &Block,
    ) -> Result<()> {
        if self.head == Some(hash) {
            return Ok(());
        }

        self.validate_chain(cache, network, &hash, block).await?;

        cache.put_block(&self.name, &hash, block).await?;
        cache.put_head(&self.name, &hash).await?;
        self.head = Some(hash);
        Ok(())
    }

    /// Check the full chain from a candidate block backward.
    pub async fn validate_chain(
        &self,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
        hash: &BlockHash,
        block: &Block,
    ) -> Result<()> {
        let computed = block.hash();
        if computed != *hash {
            return Err(ChainError::HashMismatch {
                announced: hash.to_base64(),
                computed: computed.to_base64(),
            });
        }

        let mut current_hash = *hash;
        let mut current = block.clone();
        loop {
            if current.channel_name != self.name {
                return Err(ChainError::WrongChannel {
                    expected: self.name.clone(),
                    got: current.channel_name,
                });
            }

            if leading_zero_bits(&current_hash) < self.threshold {
                return Err(ChainError::ThresholdNotMet {
                    hash: current_hash.to_base64(),
                    threshold: self.threshold,
                });
            }

            match current.prior_hash {
                Some(prior) => {
                    let fetched = fetch_block(&self.name, &prior, cache, network).await?;
                    let fetched_hash = fetched.hash();
                    if fetched_hash != prior {
                        return Err(ChainError::HashMismatch {
                            announced: prior.to_base64(),
                            computed: fetched_hash.to_base64(),
                        });
                    }
                    current_hash = prior;
                    current = fetched;
                }
                None => break,
            }
        }

        for validator in &self.validators {
            validator.validate(self, cache, network, hash, block).await?;
        }

        Ok(())
    }

    /// Fetch the remote head and adopt it if it extends the local chain.
    ///
    /// A remote chain that does not contain the local head as an ancestor
    /// is ignored without error.
    pub async fn pull(&mut self, cache: &dyn Cache, network: &dyn Network) -> Result<()> {
        let Some(remote) = network.fetch_head(&self.name).await? else {
            return Ok(());
        };
        if self.head == Some(remote) {
            return Ok(());
        }

        let name = self.name.clone();
        let mut extends = self.head.is_none();
        if !extends {
            let mut iter = ChainIter::new(&name, Some(remote), cache, Some(network));
            while let Some((hash, _)) = iter.next().await? {
                if Some(hash) == self.head {
                    extends = true;
                    break;
                }
            }
        }

        if !extends {
            debug!(channel = %name, "remote head does not extend local chain, ignoring");
            return Ok(());
        }

        let head_block = fetch_block(&name, &remote, cache, Some(network)).await?;
        self.update(cache, Some(network), remote, &head_block).await
    }

    /// Publish the head and any blocks peers do not know yet.
    pub async fn push(&self, cache: &dyn Cache, network: &dyn Network) -> Result<()> {
        let Some(head) = self.head else {
            return Ok(());
        };

        let mut iter = ChainIter::new(&self.name, Some(head), cache, None);
        while let Some((hash, block)) = iter.next().await? {
            if network.has_block(&self.name, &hash).await? {
                break;
            }
            network.announce_block(&self.name, &hash, &block).await?;
        }

        network.announce_head(&self.name, &head).await?;
        Ok(())
    }
}
