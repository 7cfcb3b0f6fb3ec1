//! SQLite implementation of the Cache trait.
//!
//! The persistent backend for long-lived nodes. Blocks and entries are
//! stored as their canonical encodings and re-decoded on read, so the
//! database holds exactly the bytes that were hashed.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use convey_core::{
    canonical_block_bytes, canonical_record_bytes, decode_block, decode_record, Block, BlockEntry,
    BlockHash, RecordHash,
};

use crate::error::{CacheError, Result};
use crate::migration;
use crate::traits::Cache;

/// SQLite-based cache. Thread-safe via an internal mutex.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open a cache database at the given path, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CacheError::Corrupt(format!("mutex poisoned: {e}")))?;
        f(&conn)
    }
}

#[async_trait]
impl Cache for SqliteCache {
    async fn get_block(&self, channel: &str, hash: &BlockHash) -> Result<Option<Block>> {
        self.with_conn(|conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT bytes FROM blocks WHERE channel = ?1 AND hash = ?2",
                    params![channel, hash.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            match bytes {
                Some(b) => decode_block(&b)
                    .map(Some)
                    .map_err(|e| CacheError::Corrupt(e.to_string())),
                None => Ok(None),
            }
        })
    }

    async fn put_block(&self, channel: &str, hash: &BlockHash, block: &Block) -> Result<()> {
        let bytes = canonical_block_bytes(block);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO blocks (channel, hash, bytes) VALUES (?1, ?2, ?3)",
                params![channel, hash.as_bytes().as_slice(), bytes],
            )?;
            Ok(())
        })
    }

    async fn get_head(&self, channel: &str) -> Result<Option<BlockHash>> {
        self.with_conn(|conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT hash FROM heads WHERE channel = ?1",
                    params![channel],
                    |row| row.get(0),
                )
                .optional()?;

            match bytes {
                Some(b) => BlockHash::try_from(b.as_slice())
                    .map(Some)
                    .map_err(|_| CacheError::Corrupt("head hash must be 32 bytes".into())),
                None => Ok(None),
            }
        })
    }

    async fn put_head(&self, channel: &str, head: &BlockHash) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO heads (channel, hash) VALUES (?1, ?2)
                 ON CONFLICT(channel) DO UPDATE SET hash = excluded.hash",
                params![channel, head.as_bytes().as_slice()],
            )?;
            Ok(())
        })
    }

    async fn put_entry(&self, channel: &str, entry: &BlockEntry) -> Result<()> {
        let bytes = canonical_record_bytes(&entry.record);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO pending_entries (channel, record_hash, bytes, queued_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    channel,
                    entry.record_hash.as_bytes().as_slice(),
                    bytes,
                    now_micros()
                ],
            )?;
            Ok(())
        })
    }

    async fn pending_entries(&self, channel: &str) -> Result<Vec<BlockEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT record_hash, bytes FROM pending_entries
                 WHERE channel = ?1 ORDER BY queued_at, record_hash",
            )?;

            let rows = stmt.query_map(params![channel], |row| {
                let hash: Vec<u8> = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                Ok((hash, bytes))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (hash, bytes) = row?;
                let record_hash = RecordHash::try_from(hash.as_slice())
                    .map_err(|_| CacheError::Corrupt("record hash must be 32 bytes".into()))?;
                let record =
                    decode_record(&bytes).map_err(|e| CacheError::Corrupt(e.to_string()))?;
                entries.push(BlockEntry {
                    record_hash,
                    record,
                });
            }
            Ok(entries)
        })
    }

    async fn remove_entries(&self, channel: &str, hashes: &[RecordHash]) -> Result<()> {
        self.with_conn(|conn| {
            for hash in hashes {
                conn.execute(
                    "DELETE FROM pending_entries WHERE channel = ?1 AND record_hash = ?2",
                    params![channel, hash.as_bytes().as_slice()],
                )?;
            }
            Ok(())
        })
    }
}

fn now_micros() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_micros() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use convey_core::{Keypair, Record};

    fn make_entry(payload: &[u8]) -> BlockEntry {
        let keypair = Keypair::from_seed(&[9; 32]);
        BlockEntry::from_record(Record::sign(1, "alice", payload.to_vec(), &keypair))
    }

    #[tokio::test]
    async fn test_block_survives_roundtrip() {
        let cache = SqliteCache::open_memory().unwrap();
        let block = Block {
            channel_name: "Convey-Conversation".into(),
            timestamp: 1,
            miner: "node".into(),
            prior_hash: Some(BlockHash::from_bytes([3; 32])),
            entries: vec![make_entry(b"payload")],
            nonce: 42,
        };
        let hash = block.hash();

        cache
            .put_block("Convey-Conversation", &hash, &block)
            .await
            .unwrap();
        let fetched = cache
            .get_block("Convey-Conversation", &hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, block);
        assert_eq!(fetched.hash(), hash);
    }

    #[tokio::test]
    async fn test_put_block_idempotent() {
        let cache = SqliteCache::open_memory().unwrap();
        let block = Block {
            channel_name: "c".into(),
            timestamp: 1,
            miner: "node".into(),
            prior_hash: None,
            entries: Vec::new(),
            nonce: 0,
        };
        let hash = block.hash();

        cache.put_block("c", &hash, &block).await.unwrap();
        cache.put_block("c", &hash, &block).await.unwrap();
        assert!(cache.get_block("c", &hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_head_upsert() {
        let cache = SqliteCache::open_memory().unwrap();
        let h1 = BlockHash::from_bytes([1; 32]);
        let h2 = BlockHash::from_bytes([2; 32]);

        cache.put_head("c", &h1).await.unwrap();
        cache.put_head("c", &h2).await.unwrap();
        assert_eq!(cache.get_head("c").await.unwrap(), Some(h2));
    }

    #[tokio::test]
    async fn test_pending_entries_ordered_and_removable() {
        let cache = SqliteCache::open_memory().unwrap();
        let e1 = make_entry(b"one");
        let e2 = make_entry(b"two");

        cache.put_entry("c", &e1).await.unwrap();
        cache.put_entry("c", &e2).await.unwrap();
        cache.put_entry("c", &e1).await.unwrap(); // duplicate, ignored

        let pending = cache.pending_entries("c").await.unwrap();
        assert_eq!(pending.len(), 2);

        cache.remove_entries("c", &[e1.record_hash]).await.unwrap();
        let pending = cache.pending_entries("c").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record_hash, e2.record_hash);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let block = Block {
            channel_name: "c".into(),
            timestamp: 1,
            miner: "node".into(),
            prior_hash: None,
            entries: Vec::new(),
            nonce: 0,
        };
        let hash = block.hash();

        {
            let cache = SqliteCache::open(&path).unwrap();
            cache.put_block("c", &hash, &block).await.unwrap();
            cache.put_head("c", &hash).await.unwrap();
        }

        let cache = SqliteCache::open(&path).unwrap();
        assert_eq!(cache.get_head("c").await.unwrap(), Some(hash));
        assert!(cache.get_block("c", &hash).await.unwrap().is_some());
    }
}
