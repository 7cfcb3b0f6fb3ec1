//! Validation of the alias chain.

use async_trait::async_trait;

use convey_cache::Cache;
use convey_chain::{BlockValidator, ChainError, ChainIter, Channel};
use convey_core::{validate_record, AliasRegistration, Block, BlockHash};
use convey_net::Network;

/// Rejects alias-chain blocks whose bindings are not self-certifying:
/// every record must be created by the alias it binds and signed by the
/// key it binds.
///
/// Uniqueness across writers is first-writer-wins at consensus level;
/// this validator only guards the binding's internal consistency.
pub struct AliasValidator;

#[async_trait]
impl BlockValidator for AliasValidator {
    async fn validate(
        &self,
        channel: &Channel,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
        hash: &BlockHash,
        block: &Block,
    ) -> convey_chain::Result<()> {
        let mut iter = ChainIter::seeded(channel.name(), *hash, block.clone(), cache, network);

        while let Some((_, block)) = iter.next().await? {
            for entry in &block.entries {
                let registration = AliasRegistration::from_bytes(&entry.record.payload)?;
                if registration.alias != entry.record.creator {
                    return Err(ChainError::Rejected(format!(
                        "alias record by {} binds {}",
                        entry.record.creator, registration.alias
                    )));
                }
                validate_record(&entry.record, &registration.public_key).map_err(|err| {
                    ChainError::Rejected(format!(
                        "alias binding for {} fails validation: {err}",
                        registration.alias
                    ))
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convey_cache::MemoryCache;
    use convey_chain::THRESHOLD_NONE;
    use convey_core::{BlockEntry, Keypair, Record};

    fn binding_block(creator: &str, registration: &AliasRegistration, signer: &Keypair) -> (BlockHash, Block) {
        let record = Record::sign(1, creator, registration.to_bytes(), signer);
        let block = Block {
            channel_name: "Convey-Alias".into(),
            timestamp: 1,
            miner: "node".into(),
            prior_hash: None,
            entries: vec![BlockEntry::from_record(record)],
            nonce: 0,
        };
        (block.hash(), block)
    }

    fn registration_for(alias: &str, keypair: &Keypair) -> AliasRegistration {
        AliasRegistration {
            alias: alias.to_string(),
            public_key: keypair.public_key(),
            agreement_key: keypair.agreement_key(),
        }
    }

    #[tokio::test]
    async fn test_accepts_self_certified_binding() {
        let cache = MemoryCache::new();
        let channel = Channel::new("Convey-Alias", THRESHOLD_NONE);
        let alice = Keypair::from_seed(&[11; 32]);

        let (hash, block) = binding_block("alice", &registration_for("alice", &alice), &alice);
        AliasValidator
            .validate(&channel, &cache, None, &hash, &block)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejects_binding_for_someone_else() {
        let cache = MemoryCache::new();
        let channel = Channel::new("Convey-Alias", THRESHOLD_NONE);
        let mallory = Keypair::from_seed(&[12; 32]);

        // Mallory publishes a binding naming alice.
        let (hash, block) = binding_block("mallory", &registration_for("alice", &mallory), &mallory);
        let err = AliasValidator
            .validate(&channel, &cache, None, &hash, &block)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_rejects_binding_signed_by_other_key() {
        let cache = MemoryCache::new();
        let channel = Channel::new("Convey-Alias", THRESHOLD_NONE);
        let alice = Keypair::from_seed(&[11; 32]);
        let mallory = Keypair::from_seed(&[12; 32]);

        // Claims alice's name and key, but mallory holds the pen.
        let (hash, block) = binding_block("alice", &registration_for("alice", &alice), &mallory);
        let err = AliasValidator
            .validate(&channel, &cache, None, &hash, &block)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_rejects_unparseable_binding() {
        let cache = MemoryCache::new();
        let channel = Channel::new("Convey-Alias", THRESHOLD_NONE);
        let alice = Keypair::from_seed(&[11; 32]);

        let record = Record::sign(1, "alice", b"not a binding".to_vec(), &alice);
        let block = Block {
            channel_name: "Convey-Alias".into(),
            timestamp: 1,
            miner: "node".into(),
            prior_hash: None,
            entries: vec![BlockEntry::from_record(record)],
            nonce: 0,
        };
        let hash = block.hash();

        let result = AliasValidator
            .validate(&channel, &cache, None, &hash, &block)
            .await;
        assert!(result.is_err());
    }
}
