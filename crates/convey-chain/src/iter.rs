//! Lazy backward walk over a chain.
//!
//! Starts from a block hash and follows prior-hash links until the chain
//! ends. Unknown blocks fall back to a network fetch and are written
//! through to the cache. The iterator is not restartable; callers walk
//! again from a new start hash instead.

use convey_cache::Cache;
use convey_core::{Block, BlockHash};
use convey_net::Network;

use crate::error::{ChainError, Result};

/// Fetch a block from the cache, falling back to peers.
///
/// Blocks fetched from peers are written through to the cache.
pub async fn fetch_block(
    channel: &str,
    hash: &BlockHash,
    cache: &dyn Cache,
    network: Option<&dyn Network>,
) -> Result<Block> {
    if let Some(block) = cache.get_block(channel, hash).await? {
        return Ok(block);
    }

    if let Some(network) = network {
        if let Some(block) = network.fetch_block(channel, hash).await? {
            cache.put_block(channel, hash, &block).await?;
            return Ok(block);
        }
    }

    Err(ChainError::BlockNotFound(hash.to_base64()))
}

/// A lazy iterator yielding `(hash, block)` pairs from a start hash
/// backward to the first block of the chain.
///
/// Consumers stop early by breaking out of their loop; there is no
/// sentinel error.
pub struct ChainIter<'a> {
    channel: &'a str,
    next: Option<BlockHash>,
    seed: Option<Block>,
    cache: &'a dyn Cache,
    network: Option<&'a dyn Network>,
}

impl<'a> ChainIter<'a> {
    /// Start a walk at the given hash. A `None` start yields nothing.
    pub fn new(
        channel: &'a str,
        start: Option<BlockHash>,
        cache: &'a dyn Cache,
        network: Option<&'a dyn Network>,
    ) -> Self {
        Self {
            channel,
            next: start,
            seed: None,
            cache,
            network,
        }
    }

    /// Start a walk at a block that is already in hand.
    ///
    /// Validators see candidate blocks before they are cached; seeding
    /// lets the walk begin there and continue through cached ancestors.
    pub fn seeded(
        channel: &'a str,
        start: BlockHash,
        start_block: Block,
        cache: &'a dyn Cache,
        network: Option<&'a dyn Network>,
    ) -> Self {
        Self {
            channel,
            next: Some(start),
            seed: Some(start_block),
            cache,
            network,
        }
    }

    /// The next block going backward, or `None` past the chain's end.
    ///
    /// A block that is in neither the cache nor any peer terminates the
    /// walk with `BlockNotFound`; the channel itself is unaffected.
    pub async fn next(&mut self) -> Result<Option<(BlockHash, Block)>> {
        let Some(hash) = self.next.take() else {
            return Ok(None);
        };

        let block = match self.seed.take() {
            Some(block) => block,
            None => fetch_block(self.channel, &hash, self.cache, self.network).await?,
        };
        self.next = block.prior_hash;
        Ok(Some((hash, block)))
    }
}
