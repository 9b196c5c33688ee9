//! Durable homes for the block log and the pending-transaction pool.
//!
//! The ledger treats storage as an append log: blocks are never updated or
//! deleted, pending transactions are appended and later removed by id.

pub mod memory;
pub mod sled_store;

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::blockchain::Block;
use crate::error::StorageError;
use crate::transaction::Transaction;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// A pending transaction with the moment it was accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Milliseconds since the Unix epoch.
    pub received_at: i64,
    pub tx: Transaction,
}

impl PendingRecord {
    pub fn now(tx: &Transaction) -> Self {
        Self {
            received_at: Utc::now().timestamp_millis(),
            tx: tx.clone(),
        }
    }
}

pub trait LedgerStore: Send + Sync {
    /// Append the next block. Fails if `block.index` is not the next index.
    fn append_block(&self, block: &Block) -> StoreResult<()>;

    fn list_blocks(&self) -> StoreResult<Vec<Block>>;

    fn append_pending(&self, tx: &Transaction) -> StoreResult<()>;

    /// Pending transactions, oldest first.
    fn list_pending(&self) -> StoreResult<Vec<Transaction>>;

    fn delete_pending(&self, ids: &HashSet<String>) -> StoreResult<()>;

    /// Append a freshly mined block and drop the transactions it confirmed.
    fn commit_block(&self, block: &Block, mined: &HashSet<String>) -> StoreResult<()> {
        self.append_block(block)?;
        self.delete_pending(mined)
    }

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

fn sort_pending(mut records: Vec<PendingRecord>) -> Vec<Transaction> {
    // Stable: equal timestamps keep arrival order.
    records.sort_by_key(|r| r.received_at);
    records.into_iter().map(|r| r.tx).collect()
}
