//! The proof-of-work nonce search.
//!
//! Single-threaded and exact: the first nonce whose block hash meets the
//! threshold wins. The search is embarrassingly parallel, but nothing
//! above this function assumes parallelism.

use convey_core::{leading_zero_bits, Block, BlockHash};

use crate::error::{ChainError, Result};
use crate::threshold::MAX_THRESHOLD;

/// Observer for a mining run. All hooks default to no-ops.
pub trait MiningListener: Send + Sync {
    /// The search is starting over the given number of entries.
    fn on_mining_started(&self, _channel: &str, _entries: usize) {}

    /// A nonce improved on the best leading-zero count so far.
    fn on_new_best(&self, _nonce: u64, _zero_bits: u32) {}

    /// The threshold was reached.
    fn on_mined(&self, _hash: &BlockHash, _nonce: u64) {}

    /// Polled each iteration; returning true aborts the search.
    fn should_abort(&self) -> bool {
        false
    }
}

/// A listener that observes nothing.
pub struct NoopListener;

impl MiningListener for NoopListener {}

/// Search for a nonce satisfying the threshold.
///
/// Consumes the block and returns it with the winning nonce set, along
/// with its hash.
pub fn mine_block(
    mut block: Block,
    threshold: u32,
    listener: &dyn MiningListener,
) -> Result<(BlockHash, Block)> {
    if threshold > MAX_THRESHOLD {
        return Err(ChainError::ThresholdTooHigh(threshold));
    }

    listener.on_mining_started(&block.channel_name, block.entries.len());

    let mut best = 0u32;
    let mut nonce = 0u64;
    loop {
        if listener.should_abort() {
            return Err(ChainError::MiningAborted);
        }

        block.nonce = nonce;
        let hash = block.hash();
        let zero_bits = leading_zero_bits(&hash);

        if zero_bits > best {
            best = zero_bits;
            listener.on_new_best(nonce, zero_bits);
        }

        if zero_bits >= threshold {
            listener.on_mined(&hash, nonce);
            return Ok((hash, block));
        }

        nonce = nonce.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convey_core::{BlockEntry, Keypair, Record};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn make_block() -> Block {
        let keypair = Keypair::from_seed(&[7; 32]);
        let record = Record::sign(1, "alice", b"payload".to_vec(), &keypair);
        Block {
            channel_name: "c".into(),
            timestamp: 1,
            miner: "node".into(),
            prior_hash: None,
            entries: vec![BlockEntry::from_record(record)],
            nonce: 0,
        }
    }

    #[test]
    fn test_mined_block_satisfies_threshold() {
        let (hash, block) = mine_block(make_block(), 4, &NoopListener).unwrap();
        assert_eq!(block.hash(), hash);
        assert!(leading_zero_bits(&hash) >= 4);
    }

    #[test]
    fn test_zero_threshold_accepts_first_nonce() {
        let (_, block) = mine_block(make_block(), 0, &NoopListener).unwrap();
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_threshold_too_high() {
        let result = mine_block(make_block(), 257, &NoopListener);
        assert!(matches!(result, Err(ChainError::ThresholdTooHigh(257))));
    }

    #[test]
    fn test_abort_stops_search() {
        struct AbortImmediately;
        impl MiningListener for AbortImmediately {
            fn should_abort(&self) -> bool {
                true
            }
        }

        let result = mine_block(make_block(), 64, &AbortImmediately);
        assert!(matches!(result, Err(ChainError::MiningAborted)));
    }

    #[test]
    fn test_listener_observes_progress() {
        #[derive(Default)]
        struct Counting {
            started: AtomicBool,
            bests: AtomicUsize,
            mined: AtomicBool,
        }
        impl MiningListener for Counting {
            fn on_mining_started(&self, _channel: &str, _entries: usize) {
                self.started.store(true, Ordering::Relaxed);
            }
            fn on_new_best(&self, _nonce: u64, _zero_bits: u32) {
                self.bests.fetch_add(1, Ordering::Relaxed);
            }
            fn on_mined(&self, _hash: &BlockHash, _nonce: u64) {
                self.mined.store(true, Ordering::Relaxed);
            }
        }

        let listener = Counting::default();
        mine_block(make_block(), 8, &listener).unwrap();
        assert!(listener.started.load(Ordering::Relaxed));
        assert!(listener.bests.load(Ordering::Relaxed) >= 1);
        assert!(listener.mined.load(Ordering::Relaxed));
    }
}
