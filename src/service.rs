//! Shared handle around a [`Ledger`].
//!
//! Writers (transfer submission, block commit) take the write lock; balance,
//! history and validation scans share the read lock. Proof-of-work runs on a
//! worker thread with no lock held, and the solved block is checked against
//! the tip again before it is appended.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{debug, error, warn};

use crate::blockchain::{Block, Ledger, MiningJob};
use crate::crypto::KeyPair;
use crate::error::{LedgerError, Result};
use crate::transaction::{HistoryEntry, Transaction, Utxo};

pub struct LedgerService {
    ledger: RwLock<Ledger>,
    mining_timeout: Option<Duration>,
    mining_max_attempts: u32,
}

impl LedgerService {
    pub fn new(ledger: Ledger, mining_timeout: Option<Duration>, mining_max_attempts: u32) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            mining_timeout,
            mining_max_attempts: mining_max_attempts.max(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().expect("ledger lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.ledger.write().expect("ledger lock poisoned")
    }

    pub fn submit_transfer(
        &self,
        sender: &KeyPair,
        recipient: &str,
        amount: u64,
    ) -> Result<Transaction> {
        self.write().submit_transfer(sender, recipient, amount)
    }

    /// Mine the next block for `miner_address`. If another block lands while
    /// the search runs, the stale result is dropped and mining restarts from
    /// the new tip, up to the configured number of attempts.
    pub async fn mine(&self, miner_address: &str) -> Result<Block> {
        let mut last_err = None;
        for attempt in 1..=self.mining_max_attempts {
            let (template, difficulty) = {
                let ledger = self.read();
                (ledger.prepare_block(miner_address)?, ledger.difficulty())
            };
            debug!(
                "MINER - attempt {}/{} on block #{} ({} txs)",
                attempt,
                self.mining_max_attempts,
                template.index,
                template.transactions.len()
            );

            let solved = MiningJob::spawn(template, difficulty)
                .finish(self.mining_timeout)
                .await?;

            let committed = self.write().commit_block(solved).map(Block::clone);
            match committed {
                Ok(block) => return Ok(block),
                Err(e @ LedgerError::StaleTip { .. }) => {
                    warn!("MINER - discarding stale block: {e}");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(LedgerError::MiningCancelled))
    }

    pub fn balance(&self, address: &str) -> u128 {
        self.read().balance_for(address)
    }

    pub fn unspent_outputs(&self, address: &str) -> Vec<Utxo> {
        self.read().unspent_outputs_for(address)
    }

    pub fn history(&self, address: &str) -> Vec<HistoryEntry> {
        self.read().history_for(address)
    }

    pub fn validate_chain(&self) -> bool {
        self.read().validate_chain()
    }

    pub fn check_chain(&self) -> Result<()> {
        self.read()
            .check_chain()
            .inspect_err(|e| error!("LEDGER - {e}"))
    }

    /// Snapshot of the chain.
    pub fn chain(&self) -> Vec<Block> {
        self.read().chain().to_vec()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.read().pending().to_vec()
    }

    pub fn height(&self) -> usize {
        self.read().len()
    }

    pub fn difficulty(&self) -> u32 {
        self.read().difficulty()
    }

    pub fn shutdown(&self) -> Result<()> {
        self.read().flush()
    }
}
