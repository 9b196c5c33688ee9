use std::collections::HashSet;
use std::path::Path;

use log::debug;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Transactional, Tree};

use super::{LedgerStore, PendingRecord, StoreResult, sort_pending};
use crate::blockchain::Block;
use crate::error::StorageError;
use crate::transaction::Transaction;

const TREE_BLOCKS: &str = "blocks";
const TREE_PENDING: &str = "pending";

/// sled-backed store. Blocks are keyed by big-endian index so iteration
/// follows chain order; pending records by a monotonic id.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    blocks: Tree,
    pending: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        let blocks = db.open_tree(TREE_BLOCKS)?;
        let pending = db.open_tree(TREE_PENDING)?;
        Ok(Self {
            db,
            blocks,
            pending,
        })
    }

    fn next_index(&self) -> StoreResult<u64> {
        match self.blocks.last()? {
            Some((key, _)) => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&key[..8]);
                Ok(u64::from_be_bytes(raw) + 1)
            }
            None => Ok(0),
        }
    }

    fn encode_block(&self, block: &Block) -> StoreResult<([u8; 8], Vec<u8>)> {
        let expected = self.next_index()?;
        if block.index != expected {
            return Err(StorageError::OutOfOrder {
                index: block.index,
                expected,
            });
        }
        Ok((block.index.to_be_bytes(), serde_json::to_vec(block)?))
    }

    fn pending_keys_for(&self, ids: &HashSet<String>) -> StoreResult<Vec<IVec>> {
        let mut keys = Vec::new();
        for entry in self.pending.iter() {
            let (key, value) = entry?;
            let record: PendingRecord = serde_json::from_slice(&value)?;
            if ids.contains(&record.tx.id) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

impl LedgerStore for SledStore {
    fn append_block(&self, block: &Block) -> StoreResult<()> {
        let (key, value) = self.encode_block(block)?;
        self.blocks.insert(key, value)?;
        debug!("STORE - saved block #{}", block.index);
        Ok(())
    }

    fn list_blocks(&self) -> StoreResult<Vec<Block>> {
        let mut blocks = Vec::new();
        for value in self.blocks.iter().values() {
            blocks.push(serde_json::from_slice(&value?)?);
        }
        Ok(blocks)
    }

    fn append_pending(&self, tx: &Transaction) -> StoreResult<()> {
        let key = self.db.generate_id()?.to_be_bytes();
        let value = serde_json::to_vec(&PendingRecord::now(tx))?;
        self.pending.insert(key, value)?;
        Ok(())
    }

    fn list_pending(&self) -> StoreResult<Vec<Transaction>> {
        let mut records = Vec::new();
        for value in self.pending.iter().values() {
            records.push(serde_json::from_slice::<PendingRecord>(&value?)?);
        }
        Ok(sort_pending(records))
    }

    fn delete_pending(&self, ids: &HashSet<String>) -> StoreResult<()> {
        for key in self.pending_keys_for(ids)? {
            self.pending.remove(key)?;
        }
        Ok(())
    }

    /// Block append and pending removal land in one sled transaction.
    fn commit_block(&self, block: &Block, mined: &HashSet<String>) -> StoreResult<()> {
        let (key, value) = self.encode_block(block)?;
        let doomed = self.pending_keys_for(mined)?;

        (&self.blocks, &self.pending)
            .transaction(|(blocks, pending)| {
                blocks.insert(key.to_vec(), value.clone())?;
                for k in &doomed {
                    pending.remove(k.clone())?;
                }
                Ok::<_, ConflictableTransactionError<()>>(())
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => StorageError::Database(e),
                TransactionError::Abort(()) => StorageError::Aborted,
            })?;

        debug!(
            "STORE - committed block #{} (removed {} pending)",
            block.index,
            doomed.len()
        );
        Ok(())
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = Block::genesis();
        let tx = Transaction::reward(1, "a", 5).unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.append_block(&genesis).unwrap();
            store.append_pending(&tx).unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.list_blocks().unwrap(), vec![genesis]);
        assert_eq!(store.list_pending().unwrap(), vec![tx]);
    }

    #[test]
    fn commit_is_append_plus_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let genesis = Block::genesis();
        store.append_block(&genesis).unwrap();

        let keep = Transaction::reward(10, "keep", 1).unwrap();
        let mined = Transaction::reward(11, "mined", 1).unwrap();
        store.append_pending(&mined).unwrap();
        store.append_pending(&keep).unwrap();

        let block = Block::new(1, genesis.hash.clone(), vec![mined.clone()]);
        store
            .commit_block(&block, &HashSet::from([mined.id.clone()]))
            .unwrap();

        assert_eq!(store.list_blocks().unwrap().len(), 2);
        assert_eq!(store.list_pending().unwrap(), vec![keep]);
    }

    #[test]
    fn rejects_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let orphan = Block::new(3, "x".into(), Vec::new());
        assert!(matches!(
            store.append_block(&orphan),
            Err(StorageError::OutOfOrder { expected: 0, .. })
        ));
    }
}
