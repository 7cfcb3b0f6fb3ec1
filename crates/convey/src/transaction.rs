//! Validation of the transaction chain.

use async_trait::async_trait;

use convey_cache::Cache;
use convey_chain::{BlockValidator, ChainError, ChainIter, Channel};
use convey_core::{Block, BlockHash, Transaction};
use convey_net::Network;

/// Rejects any transaction block whose record creator is not the
/// transaction's sender — nobody spends someone else's tokens.
///
/// Runs over the full chain from the candidate block backward on every
/// acceptance.
pub struct TransactionValidator;

#[async_trait]
impl BlockValidator for TransactionValidator {
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
                let transaction = Transaction::from_bytes(&entry.record.payload)?;
                if entry.record.creator != transaction.sender {
                    return Err(ChainError::Rejected(format!(
                        "Record Creator and Transaction Sender don't match: {} vs {}",
                        entry.record.creator, transaction.sender
                    )));
                }
            }
        }

        Ok(())
    }
}
