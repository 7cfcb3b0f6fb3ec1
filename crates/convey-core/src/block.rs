//! Block: a proof-of-work-sealed, ordered set of records on one chain.
//!
//! Blocks link backward by prior hash; the head of a channel is the block
//! with the most accumulated work. A block is valid for a channel when its
//! hash carries at least the channel's threshold of leading zero bits.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_block_bytes;
use crate::record::Record;
use crate::types::{BlockHash, RecordHash};

/// One record slotted into a block, keyed by its content address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    /// The record's content address.
    pub record_hash: RecordHash,

    /// The record itself.
    pub record: Record,
}

impl BlockEntry {
    /// Build an entry from a record, computing its hash.
    pub fn from_record(record: Record) -> Self {
        Self {
            record_hash: record.hash(),
            record,
        }
    }
}

/// A proof-of-work block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Name of the channel this block belongs to.
    pub channel_name: String,

    /// When the block was assembled (Unix seconds).
    pub timestamp: u64,

    /// Alias of the miner. PVC rewards are credited here.
    pub miner: String,

    /// Hash of the previous block, None for the first block of a chain.
    pub prior_hash: Option<BlockHash>,

    /// Ordered records sealed into this block.
    pub entries: Vec<BlockEntry>,

    /// Nonce found by the mining search.
    pub nonce: u64,
}

impl Block {
    /// Compute the block's content address.
    pub fn hash(&self) -> BlockHash {
        BlockHash(*blake3::hash(&canonical_block_bytes(self)).as_bytes())
    }

    /// Whether this block's hash satisfies the given threshold.
    pub fn satisfies(&self, threshold: u32) -> bool {
        leading_zero_bits(&self.hash()) >= threshold
    }
}

/// Count the leading zero bits of a hash, big-endian.
///
/// A hash satisfies threshold `t` exactly when this is at least `t`,
/// i.e. when the hash is below 2^(256 - t).
pub fn leading_zero_bits(hash: &BlockHash) -> u32 {
    let mut bits = 0;
    for byte in hash.0 {
        if byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}
