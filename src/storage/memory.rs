use std::collections::HashSet;
use std::sync::Mutex;

use super::{LedgerStore, PendingRecord, StoreResult, sort_pending};
use crate::blockchain::Block;
use crate::error::StorageError;
use crate::transaction::Transaction;

/// Process-local store for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Mutex<Vec<Block>>,
    pending: Mutex<Vec<PendingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn append_block(&self, block: &Block) -> StoreResult<()> {
        let mut blocks = self.blocks.lock().map_err(|_| StorageError::Poisoned)?;
        let expected = blocks.len() as u64;
        if block.index != expected {
            return Err(StorageError::OutOfOrder {
                index: block.index,
                expected,
            });
        }
        blocks.push(block.clone());
        Ok(())
    }

    fn list_blocks(&self) -> StoreResult<Vec<Block>> {
        let blocks = self.blocks.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(blocks.clone())
    }

    fn append_pending(&self, tx: &Transaction) -> StoreResult<()> {
        let mut pending = self.pending.lock().map_err(|_| StorageError::Poisoned)?;
        pending.push(PendingRecord::now(tx));
        Ok(())
    }

    fn list_pending(&self) -> StoreResult<Vec<Transaction>> {
        let pending = self.pending.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(sort_pending(pending.clone()))
    }

    fn delete_pending(&self, ids: &HashSet<String>) -> StoreResult<()> {
        let mut pending = self.pending.lock().map_err(|_| StorageError::Poisoned)?;
        pending.retain(|r| !ids.contains(&r.tx.id));
        Ok(())
    }
}
