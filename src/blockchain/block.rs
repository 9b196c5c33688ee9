use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::sha256_hex;
use crate::transaction::Transaction;

/// How often the cancellable search polls its stop flag.
const CANCEL_POLL_INTERVAL: u64 = 1024;

/// A single block in the chain holding an ordered batch of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    /// Milliseconds since the Unix epoch, as a decimal string.
    pub timestamp: String,
    pub transactions: Vec<Transaction>,
    pub hash: String, // Cached hash of the block
    pub nonce: u64,   // Proof-of-Work nonce
}

/// Why a block fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityFault {
    #[error("genesis block must have index 0, previous hash \"0\" and no transactions")]
    BadGenesis,
    #[error("expected block index {expected}")]
    IndexGap { expected: u64 },
    #[error("stored hash does not match block content")]
    HashMismatch,
    #[error("transaction {tx_id} fails verification")]
    InvalidTransaction { tx_id: String },
    #[error("previous hash does not match the predecessor's hash")]
    BrokenLink,
    #[error("hash does not have {difficulty} leading zeros")]
    InsufficientWork { difficulty: u32 },
}

impl Block {
    /// Create the genesis block (first block in the chain). It carries no
    /// transactions and is exempt from proof-of-work.
    pub fn genesis() -> Self {
        Self::new(0, String::from("0"), Vec::new())
    }

    /// Create a new block stamped with the current time (not mined yet).
    pub fn new(index: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        Self::new_with_timestamp(
            index,
            previous_hash,
            transactions,
            Utc::now().timestamp_millis().to_string(),
        )
    }

    pub fn new_with_timestamp(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        timestamp: String,
    ) -> Self {
        let mut block = Self {
            index,
            previous_hash,
            timestamp,
            transactions,
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// SHA-256 over index, previous hash, timestamp, the JSON of the
    /// transactions and the nonce (the `hash` field itself is excluded).
    pub fn compute_hash(&self) -> String {
        self.hash_with(&self.transactions_json())
    }

    fn transactions_json(&self) -> String {
        // Transactions are plain data with no maps or floats; serializing cannot fail.
        serde_json::to_string(&self.transactions).expect("serialize txs")
    }

    fn hash_with(&self, txs_json: &str) -> String {
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            self.index, self.previous_hash, self.timestamp, txs_json, self.nonce
        );
        sha256_hex(preimage.as_bytes())
    }

    /// Perform Proof-of-Work: bump the nonce from its current value until the
    /// hash starts with `difficulty` zero hex digits. Unbounded.
    pub fn mine(&mut self, difficulty: u32) {
        let never = AtomicBool::new(false);
        self.mine_cancellable(difficulty, &never);
    }

    /// Like [`Block::mine`] but gives up when `cancel` is raised. Returns
    /// whether a valid nonce was found.
    pub fn mine_cancellable(&mut self, difficulty: u32, cancel: &AtomicBool) -> bool {
        let txs_json = self.transactions_json();
        let mut tries: u64 = 0;
        loop {
            self.hash = self.hash_with(&txs_json);
            if meets_difficulty(&self.hash, difficulty) {
                return true;
            }
            tries += 1;
            if tries % CANCEL_POLL_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return false;
            }
            self.nonce = self.nonce.wrapping_add(1);
        }
    }

    /// Validate that the block's cached `hash` matches its content and
    /// satisfies the PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self, difficulty: u32) -> bool {
        self.hash == self.compute_hash() && meets_difficulty(&self.hash, difficulty)
    }

    /// Full single-block check: hash integrity, every transaction verifies,
    /// and the proof-of-work target is met.
    pub fn check(&self, difficulty: u32) -> Result<(), IntegrityFault> {
        if self.hash != self.compute_hash() {
            return Err(IntegrityFault::HashMismatch);
        }
        if let Some(tx) = self.transactions.iter().find(|tx| !tx.verify()) {
            return Err(IntegrityFault::InvalidTransaction {
                tx_id: tx.id.clone(),
            });
        }
        if !meets_difficulty(&self.hash, difficulty) {
            return Err(IntegrityFault::InsufficientWork { difficulty });
        }
        Ok(())
    }
}

/// True when the first `difficulty` hex characters of `hash` are all `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let needed = difficulty as usize;
    hash.len() >= needed && hash.bytes().take(needed).all(|c| c == b'0')
}
