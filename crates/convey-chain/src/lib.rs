//! # Convey Chain
//!
//! Proof-of-work channels: mining, backward iteration, and chain-level
//! validation.
//!
//! ## Key Types
//!
//! - [`Channel`] - A named PoW chain with a head pointer and validators
//! - [`ChainIter`] - Lazy backward walk through prior-hash links
//! - [`BlockValidator`] - Chain acceptance checks
//! - [`SignatureValidator`] - Rejects records not signed by their
//!   creator's key, as bound in a [`KeyDirectory`]
//! - [`MiningListener`] - Observer and abort hook for the nonce search
//!
//! ## Acceptance
//!
//! A candidate head is accepted only when every block reachable from it
//! satisfies the channel threshold and every validator accepts it. Pulls
//! that do not extend the local chain are ignored; there is no global
//! consensus beyond longest-PoW per chain.

pub mod channel;
pub mod error;
pub mod iter;
pub mod mine;
pub mod signature;
pub mod threshold;

pub use channel::{BlockValidator, Channel};
pub use error::{ChainError, Result};
pub use iter::{fetch_block, ChainIter};
pub use mine::{mine_block, MiningListener, NoopListener};
pub use signature::{KeyDirectory, MemoryKeyDirectory, SignatureValidator};
pub use threshold::{
    MAX_THRESHOLD, THRESHOLD_G, THRESHOLD_NONE, THRESHOLD_PERIOD_CENTURY, THRESHOLD_PERIOD_DAY,
    THRESHOLD_PERIOD_DECADE, THRESHOLD_PERIOD_HOUR, THRESHOLD_PERIOD_WEEK, THRESHOLD_PERIOD_YEAR,
};
