//! Signature validation for accepted blocks.
//!
//! Records carry their creator's alias, not their key; the binding lives
//! on the alias chain. A [`KeyDirectory`] holds the bindings a node has
//! learned, and the [`SignatureValidator`] rejects any block carrying a
//! record whose signature does not verify against its creator's bound
//! key. Creators with no binding pass through: their identity is not
//! yet established, and establishing it is the alias chain's job.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use convey_cache::Cache;
use convey_core::{validate_record, Block, BlockHash, Ed25519PublicKey};
use convey_net::Network;

use crate::channel::{BlockValidator, Channel};
use crate::error::{ChainError, Result};
use crate::iter::ChainIter;

/// Alias-to-signing-key bindings, as far as this node knows them.
pub trait KeyDirectory: Send + Sync {
    /// The signing key bound to an alias, when known.
    fn signing_key(&self, alias: &str) -> Option<Ed25519PublicKey>;

    /// Record a binding. The first writer wins; a later binding for the
    /// same alias is ignored.
    fn bind(&self, alias: &str, key: Ed25519PublicKey);
}

/// In-memory key directory. Thread-safe via RwLock.
pub struct MemoryKeyDirectory {
    keys: RwLock<HashMap<String, Ed25519PublicKey>>,
}

impl MemoryKeyDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryKeyDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDirectory for MemoryKeyDirectory {
    fn signing_key(&self, alias: &str) -> Option<Ed25519PublicKey> {
        self.keys.read().unwrap().get(alias).copied()
    }

    fn bind(&self, alias: &str, key: Ed25519PublicKey) {
        self.keys
            .write()
            .unwrap()
            .entry(alias.to_string())
            .or_insert(key);
    }
}

/// Rejects blocks whose records are not signed by their claimed creator.
///
/// Runs over the full chain from the candidate block backward on every
/// acceptance, like every chain validator.
pub struct SignatureValidator {
    directory: Arc<dyn KeyDirectory>,
}

impl SignatureValidator {
    pub fn new(directory: Arc<dyn KeyDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl BlockValidator for SignatureValidator {
    async fn validate(
        &self,
        channel: &Channel,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
        hash: &BlockHash,
        block: &Block,
    ) -> Result<()> {
        let mut iter = ChainIter::seeded(channel.name(), *hash, block.clone(), cache, network);

        while let Some((_, block)) = iter.next().await? {
            for entry in &block.entries {
                let Some(key) = self.directory.signing_key(&entry.record.creator) else {
                    continue;
                };
                validate_record(&entry.record, &key).map_err(|err| {
                    ChainError::Rejected(format!(
                        "record {} claims creator {} but fails validation: {err}",
                        entry.record_hash, entry.record.creator
                    ))
                })?;
            }
        }

        Ok(())
    }
}
