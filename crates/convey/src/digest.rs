//! Digest selection: the highest-yielding conversations of a period.

use std::ops::ControlFlow;

use convey_core::Message;

use crate::error::Result;
use crate::store::MessageStore;

/// How many conversations a digest carries.
pub const DIGEST_LIMIT: usize = 4;

/// One conversation's digest line: its listing plus economics.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub hash: String,
    pub topic: String,
    pub timestamp: u64,
    pub author: String,
    pub cost: u64,
    pub reward: u64,
    /// `reward - cost`; the sort key.
    pub yield_: i64,
    /// The conversation's root message, when one exists.
    pub message: Option<Message>,
}

/// The top conversations by yield from the given time window.
///
/// Fewer than [`DIGEST_LIMIT`] conversations come back as-is, sorted;
/// callers gate on the count if they need a full digest.
pub async fn get_digest_entries(
    store: &dyn MessageStore,
    from: u64,
    to: u64,
) -> Result<Vec<DigestEntry>> {
    let conversations = store.get_all_conversations(from, to).await?;

    let mut entries = Vec::with_capacity(conversations.len());
    for listing in conversations {
        let mut message = None;
        store
            .get_message(&listing.hash, None, &mut |view| {
                if view.message.is_root() {
                    message = Some(view.message);
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            })
            .await?;

        let (message_cost, message_reward) = store.get_yield(&listing.hash).await?;

        let cost = listing.cost + message_cost;
        let reward = message_reward;
        entries.push(DigestEntry {
            hash: listing.hash.to_base64(),
            topic: listing.topic,
            timestamp: listing.timestamp,
            author: listing.author,
            cost,
            reward,
            yield_: reward as i64 - cost as i64,
            message,
        });
    }

    // Stable sort: equal yields keep their window order.
    entries.sort_by(|a, b| b.yield_.cmp(&a.yield_));
    entries.truncate(DIGEST_LIMIT);

    Ok(entries)
}
