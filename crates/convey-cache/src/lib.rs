//! # Convey Cache
//!
//! Storage abstraction for Convey blocks, heads, and pending entries.
//!
//! ## Overview
//!
//! The cache is an opaque content-addressed store behind the [`Cache`]
//! trait. [`SqliteCache`] is the persistent backend; [`MemoryCache`]
//! serves tests and ephemeral nodes.
//!
//! ## Design Notes
//!
//! - **Idempotent writes**: every key is a content address, so re-putting
//!   the same block or entry is a no-op and collisions cannot corrupt
//!   distinct data.
//! - **Pending entries**: records wait per channel until a miner seals
//!   them into a block.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{CacheError, Result};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use traits::Cache;
