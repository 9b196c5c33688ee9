use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::{Block, IntegrityFault, meets_difficulty};
use crate::config::LedgerConfig;
use crate::crypto::{KeyPair, normalize_address};
use crate::error::{LedgerError, Result};
use crate::storage::LedgerStore;
use crate::transaction::{
    HistoryEntry, OutPoint, Transaction, TxInput, TxOutput, Utxo, balance_for, history_for,
    unspent_outputs_for,
};

/// Append-only chain of blocks plus the pool of transactions waiting to be
/// mined. Every mutation is persisted before it becomes visible in memory.
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    config: LedgerConfig,
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    /// Load the chain and pending pool from `store`, creating and persisting
    /// the genesis block when the store is empty.
    pub fn initialize(config: LedgerConfig, store: Arc<dyn LedgerStore>) -> Result<Self> {
        let mut chain = store.list_blocks()?;
        if chain.is_empty() {
            let genesis = Block::genesis();
            store.append_block(&genesis)?;
            info!("LEDGER - created genesis block {}", genesis.hash);
            chain.push(genesis);
        }
        let pending = store.list_pending()?;

        let ledger = Self {
            chain,
            pending,
            config,
            store,
        };
        info!(
            "LEDGER - loaded {} blocks, {} pending transactions (difficulty={})",
            ledger.chain.len(),
            ledger.pending.len(),
            ledger.config.difficulty
        );
        if let Err(e) = ledger.check_chain() {
            warn!("LEDGER - stored chain does not validate: {e}");
        }
        Ok(ledger)
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()?;
        Ok(())
    }

    /// Flush the store and drop the ledger.
    pub fn shutdown(self) -> Result<()> {
        self.flush()?;
        info!("LEDGER - shut down at height {}", self.chain.len());
        Ok(())
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("ledger always holds at least the genesis block")
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn unspent_outputs_for(&self, address: &str) -> Vec<Utxo> {
        unspent_outputs_for(&self.chain, &stored_form(address))
    }

    pub fn balance_for(&self, address: &str) -> u128 {
        balance_for(&self.chain, &stored_form(address))
    }

    pub fn history_for(&self, address: &str) -> Vec<HistoryEntry> {
        history_for(&self.chain, &stored_form(address))
    }

    /// Build, sign and queue a transfer of `amount` from `sender` to `recipient`.
    ///
    /// Inputs are the sender's unspent outputs in chain order, taken until
    /// they cover `amount`; outputs already claimed by a pending transfer are
    /// skipped. Any excess comes back to the sender as a change output.
    pub fn submit_transfer(
        &mut self,
        sender: &KeyPair,
        recipient: &str,
        amount: u64,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidTransactionShape(
                "amount must be > 0".into(),
            ));
        }
        let recipient = normalize_address(recipient)?;
        let sender_address = sender.address();

        let reserved: HashSet<OutPoint> = self
            .pending
            .iter()
            .flat_map(|tx| tx.inputs())
            .map(TxInput::outpoint)
            .collect();
        let spendable: Vec<Utxo> = self
            .unspent_outputs_for(&sender_address)
            .into_iter()
            .filter(|u| !reserved.contains(&u.outpoint))
            .collect();

        let available: u128 = spendable.iter().map(|u| u.amount as u128).sum();
        if available < amount as u128 {
            warn!(
                "TRANSFER - rejected: {} holds {} spendable, needs {}",
                sender_address, available, amount
            );
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        let mut accumulated: u128 = 0;
        let mut inputs = Vec::new();
        for utxo in spendable {
            if accumulated >= amount as u128 {
                break;
            }
            accumulated += utxo.amount as u128;
            inputs.push(TxInput::unsigned(utxo.outpoint, &sender_address));
        }
        debug!(
            "TRANSFER - selected {} inputs worth {} for amount {}",
            inputs.len(),
            accumulated,
            amount
        );

        let mut outputs = vec![TxOutput {
            amount,
            address: recipient,
        }];
        if accumulated > amount as u128 {
            // Bounded by the last selected output, so it fits.
            let change = u64::try_from(accumulated - amount as u128).map_err(|_| {
                LedgerError::InvalidTransactionShape("change does not fit in u64".into())
            })?;
            outputs.push(TxOutput {
                amount: change,
                address: sender_address,
            });
        }

        let mut tx = Transaction::create(inputs, outputs)?;
        tx.sign(sender)?;

        self.store.append_pending(&tx)?;
        self.pending.push(tx.clone());
        info!(
            "TRANSFER - txid={} queued (pending: {})",
            tx.id,
            self.pending.len()
        );
        Ok(tx)
    }

    /// Assemble the next block without mining it: the reward first, then up
    /// to `block_capacity - 1` pending transactions, oldest first.
    pub fn prepare_block(&self, miner_address: &str) -> Result<Block> {
        let miner_address = normalize_address(miner_address)?;
        let index = self.chain.len() as u64;
        let reward = Transaction::reward(index, miner_address, self.config.mining_reward)?;

        let take = self.config.block_capacity.saturating_sub(1);
        let mut transactions = Vec::with_capacity(1 + take.min(self.pending.len()));
        transactions.push(reward);
        transactions.extend(self.pending.iter().take(take).cloned());

        Ok(Block::new(
            index,
            self.last_block().hash.clone(),
            transactions,
        ))
    }

    /// Validate a mined block against the current tip, persist it, append it,
    /// and drop the transactions it confirms from the pending pool.
    ///
    /// A block built on a tip that has since moved is rejected with
    /// [`LedgerError::StaleTip`] and nothing changes.
    pub fn commit_block(&mut self, block: Block) -> Result<&Block> {
        let tip = self.last_block();
        if block.previous_hash != tip.hash || block.index != self.chain.len() as u64 {
            return Err(LedgerError::StaleTip {
                expected: block.previous_hash,
                actual: tip.hash.clone(),
            });
        }
        block
            .check(self.config.difficulty)
            .map_err(|fault| LedgerError::ChainIntegrityViolation {
                index: block.index,
                fault,
            })?;

        let mined: HashSet<String> = block
            .transactions
            .iter()
            .filter(|tx| !tx.is_reward())
            .map(|tx| tx.id.clone())
            .collect();

        self.store.commit_block(&block, &mined)?;

        let before = self.pending.len();
        self.pending.retain(|tx| !mined.contains(&tx.id));
        info!(
            "MINER - sealed block #{} (hash={}, nonce={}, txs={}, pending {} -> {})",
            block.index,
            block.hash,
            block.nonce,
            block.transactions.len(),
            before,
            self.pending.len()
        );
        self.chain.push(block);
        Ok(self.last_block())
    }

    /// Mine the next block paying the reward to `miner_address`. Proceeds
    /// with only the reward when the pool is empty.
    pub fn mine_next_block(&mut self, miner_address: &str) -> Result<&Block> {
        let mut block = self.prepare_block(miner_address)?;
        block.mine(self.config.difficulty);
        self.commit_block(block)
    }

    /// Check the whole chain. Returns the first violation found.
    pub fn check_chain(&self) -> Result<()> {
        let violation = |index: u64, fault: IntegrityFault| LedgerError::ChainIntegrityViolation {
            index,
            fault,
        };

        let Some(genesis) = self.chain.first() else {
            return Err(violation(0, IntegrityFault::BadGenesis));
        };
        if genesis.index != 0 || genesis.previous_hash != "0" || !genesis.transactions.is_empty()
        {
            return Err(violation(0, IntegrityFault::BadGenesis));
        }
        if genesis.hash != genesis.compute_hash() {
            return Err(violation(0, IntegrityFault::HashMismatch));
        }

        for (i, pair) in self.chain.windows(2).enumerate() {
            let (prev, current) = (&pair[0], &pair[1]);
            let expected = i as u64 + 1;
            if let Some(fault) = self.block_fault(prev, current, expected) {
                return Err(violation(expected, fault));
            }
        }
        Ok(())
    }

    fn block_fault(&self, prev: &Block, current: &Block, expected: u64) -> Option<IntegrityFault> {
        if current.index != expected {
            return Some(IntegrityFault::IndexGap { expected });
        }
        if current.hash != current.compute_hash() {
            return Some(IntegrityFault::HashMismatch);
        }
        if let Some(tx) = current.transactions.iter().find(|tx| !tx.verify()) {
            return Some(IntegrityFault::InvalidTransaction {
                tx_id: tx.id.clone(),
            });
        }
        if current.previous_hash != prev.hash {
            return Some(IntegrityFault::BrokenLink);
        }
        if !meets_difficulty(&current.hash, self.config.difficulty) {
            return Some(IntegrityFault::InsufficientWork {
                difficulty: self.config.difficulty,
            });
        }
        None
    }

    /// Validate the entire chain: hashes, signatures, linkage and PoW.
    /// Read-only; the first violation is logged.
    pub fn validate_chain(&self) -> bool {
        match self.check_chain() {
            Ok(()) => true,
            Err(e) => {
                error!("LEDGER - {e}");
                false
            }
        }
    }
}

/// Addresses are stored compressed; a key given in any valid encoding maps to
/// that form. Anything else is matched as-is and simply owns nothing.
fn stored_form(address: &str) -> String {
    normalize_address(address).unwrap_or_else(|_| address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{MemoryStore, StoreResult};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn test_config() -> LedgerConfig {
        LedgerConfig {
            difficulty: 2,
            mining_reward: 100,
            block_capacity: 5,
        }
    }

    fn fresh() -> Ledger {
        Ledger::initialize(test_config(), Arc::new(MemoryStore::new())).unwrap()
    }

    fn violation_index(ledger: &Ledger) -> u64 {
        match ledger.check_chain() {
            Err(LedgerError::ChainIntegrityViolation { index, .. }) => index,
            other => panic!("expected violation, got {other:?}"),
        }
    }

    #[test]
    fn starts_with_genesis() {
        let ledger = fresh();
        assert_eq!(ledger.len(), 1);
        let genesis = &ledger.chain()[0];
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert!(genesis.transactions.is_empty());
        assert!(ledger.validate_chain());
    }

    #[test]
    fn transfer_scenario() {
        let mut ledger = fresh();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let (a, b) = (alice.address(), bob.address());

        ledger.mine_next_block(&a).unwrap();
        assert_eq!(ledger.balance_for(&a), 100);

        let tx = ledger.submit_transfer(&alice, &b, 30).unwrap();
        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(tx.inputs().len(), 1);
        assert_eq!(tx.inputs()[0].source_tx_id, ledger.chain()[1].transactions[0].id);
        assert_eq!(
            tx.outputs,
            vec![
                TxOutput {
                    amount: 30,
                    address: b.clone()
                },
                TxOutput {
                    amount: 70,
                    address: a.clone()
                },
            ]
        );
        assert!(tx.verify());
        // Pending transfers do not move confirmed balances.
        assert_eq!(ledger.balance_for(&a), 100);

        let miner = KeyPair::generate().address();
        let block = ledger.mine_next_block(&miner).unwrap().clone();
        assert_eq!(block.transactions.len(), 2);
        assert!(block.transactions[0].is_reward());
        assert!(ledger.pending().is_empty());

        assert_eq!(ledger.balance_for(&a), 70);
        assert_eq!(ledger.balance_for(&b), 30);
        assert_eq!(ledger.balance_for(&miner), 100);
        assert!(ledger.validate_chain());
    }

    fn uncompressed(address: &str) -> String {
        let bytes = hex::decode(address).unwrap();
        let pk = secp256k1::PublicKey::from_slice(&bytes).unwrap();
        hex::encode(pk.serialize_uncompressed())
    }

    #[test]
    fn queries_accept_either_key_encoding() {
        let mut ledger = fresh();
        let alice = KeyPair::generate();
        let long = uncompressed(&alice.address());
        assert!(long.starts_with("04"));

        ledger.mine_next_block(&long).unwrap();
        assert_eq!(ledger.chain()[1].transactions[0].outputs[0].address, alice.address());

        for form in [long.as_str(), alice.address().as_str()] {
            assert_eq!(ledger.balance_for(form), 100);
            assert_eq!(ledger.unspent_outputs_for(form).len(), 1);
            assert_eq!(ledger.history_for(form).len(), 1);
        }
        assert_eq!(ledger.balance_for(&long.to_uppercase()), 100);
        assert_eq!(ledger.balance_for("not-an-address"), 0);
        assert!(ledger.history_for("").is_empty());
    }

    #[test]
    fn change_is_exact_beyond_u64_totals() {
        let mut ledger = Ledger::initialize(
            LedgerConfig {
                difficulty: 1,
                mining_reward: 1 << 63,
                block_capacity: 5,
            },
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().address();
        for _ in 0..3 {
            ledger.mine_next_block(&alice.address()).unwrap();
        }

        let tx = ledger.submit_transfer(&alice, &bob, u64::MAX).unwrap();
        assert_eq!(tx.inputs().len(), 2);
        assert_eq!(
            tx.outputs,
            vec![
                TxOutput {
                    amount: u64::MAX,
                    address: bob.clone()
                },
                TxOutput {
                    amount: 1,
                    address: alice.address()
                },
            ]
        );
        assert_eq!(tx.total_output_amount(), 1u128 << 64);
    }

    #[test]
    fn exact_amount_has_no_change_output() {
        let mut ledger = fresh();
        let alice = KeyPair::generate();
        ledger.mine_next_block(&alice.address()).unwrap();
        let bob = KeyPair::generate().address();
        let tx = ledger.submit_transfer(&alice, &bob, 100).unwrap();
        assert_eq!(tx.outputs.len(), 1);
    }

    #[test]
    fn greedy_selection_is_oldest_first() {
        let mut ledger = fresh();
        let alice = KeyPair::generate();
        let a = alice.address();
        for _ in 0..3 {
            ledger.mine_next_block(&a).unwrap();
        }
        let bob = KeyPair::generate().address();
        let tx = ledger.submit_transfer(&alice, &bob, 150).unwrap();
        let sources: Vec<_> = tx.inputs().iter().map(|i| i.source_tx_id.clone()).collect();
        assert_eq!(
            sources,
            vec![
                ledger.chain()[1].transactions[0].id.clone(),
                ledger.chain()[2].transactions[0].id.clone(),
            ]
        );
        assert_eq!(tx.outputs[1].amount, 50);
    }

    #[test]
    fn sender_balance_drops_by_exactly_the_amount() {
        let mut ledger = fresh();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let miner = KeyPair::generate().address();
        ledger.mine_next_block(&alice.address()).unwrap();
        ledger.mine_next_block(&alice.address()).unwrap();

        for amount in [10, 25, 40] {
            let before = ledger.balance_for(&alice.address());
            ledger.submit_transfer(&alice, &bob.address(), amount).unwrap();
            ledger.mine_next_block(&miner).unwrap();
            assert_eq!(ledger.balance_for(&alice.address()), before - amount as u128);
        }
        assert_eq!(ledger.balance_for(&bob.address()), 75);

        ledger.submit_transfer(&bob, &alice.address(), 5).unwrap();
        ledger.mine_next_block(&miner).unwrap();
        assert_eq!(ledger.balance_for(&bob.address()), 70);
        assert_eq!(ledger.balance_for(&alice.address()), 130);
        assert!(ledger.validate_chain());
    }

    #[test]
    fn zero_balance_is_insufficient() {
        let mut ledger = fresh();
        let carol = KeyPair::generate();
        let bob = KeyPair::generate().address();
        let err = ledger.submit_transfer(&carol, &bob, 1).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                required: 1,
                available: 0
            }
        ));
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn pending_outputs_are_not_offered_twice() {
        let mut ledger = fresh();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().address();
        ledger.mine_next_block(&alice.address()).unwrap();

        ledger.submit_transfer(&alice, &bob, 30).unwrap();
        let err = ledger.submit_transfer(&alice, &bob, 30).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        // Once confirmed, the change output is spendable.
        let miner = KeyPair::generate().address();
        ledger.mine_next_block(&miner).unwrap();
        ledger.submit_transfer(&alice, &bob, 30).unwrap();
    }

    #[test]
    fn rejects_bad_requests() {
        let mut ledger = fresh();
        let alice = KeyPair::generate();
        ledger.mine_next_block(&alice.address()).unwrap();
        assert!(matches!(
            ledger.submit_transfer(&alice, &KeyPair::generate().address(), 0),
            Err(LedgerError::InvalidTransactionShape(_))
        ));
        assert!(matches!(
            ledger.submit_transfer(&alice, "not-an-address", 5),
            Err(LedgerError::InvalidKey(_))
        ));
        assert!(matches!(
            ledger.mine_next_block("nope"),
            Err(LedgerError::InvalidKey(_))
        ));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn mining_with_empty_pool_pays_reward() {
        let mut ledger = fresh();
        let miner = KeyPair::generate().address();
        let block = ledger.mine_next_block(&miner).unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.transactions.len(), 1);
        assert!(meets_difficulty(&block.hash, 2));
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn rewards_to_same_miner_have_distinct_ids() {
        let mut ledger = fresh();
        let miner = KeyPair::generate().address();
        let first = ledger.mine_next_block(&miner).unwrap().transactions[0].id.clone();
        let second = ledger.mine_next_block(&miner).unwrap().transactions[0].id.clone();
        assert_ne!(first, second);
        assert_eq!(ledger.balance_for(&miner), 200);
    }

    #[test]
    fn block_capacity_limits_included_transfers() {
        let mut ledger = Ledger::initialize(
            LedgerConfig {
                difficulty: 1,
                mining_reward: 100,
                block_capacity: 2,
            },
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().address();
        for _ in 0..2 {
            ledger.mine_next_block(&alice.address()).unwrap();
        }
        let first = ledger.submit_transfer(&alice, &bob, 10).unwrap();
        let second = ledger.submit_transfer(&alice, &bob, 10).unwrap();

        let miner = KeyPair::generate().address();
        let block = ledger.mine_next_block(&miner).unwrap().clone();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[1].id, first.id);
        assert_eq!(ledger.pending(), &[second.clone()]);

        let block = ledger.mine_next_block(&miner).unwrap().clone();
        assert_eq!(block.transactions[1].id, second.id);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn tampered_previous_hash_reports_block_two() {
        let mut ledger = fresh();
        let miner = KeyPair::generate().address();
        ledger.mine_next_block(&miner).unwrap();
        ledger.mine_next_block(&miner).unwrap();
        assert!(ledger.validate_chain());

        ledger.chain[2].previous_hash = "f".repeat(64);
        assert!(!ledger.validate_chain());
        assert_eq!(violation_index(&ledger), 2);
    }

    #[test]
    fn relinked_block_with_fresh_work_still_breaks_the_link() {
        let mut ledger = fresh();
        let miner = KeyPair::generate().address();
        ledger.mine_next_block(&miner).unwrap();
        ledger.mine_next_block(&miner).unwrap();

        let forged = &mut ledger.chain[2];
        forged.previous_hash = "f".repeat(64);
        forged.nonce = 0;
        forged.mine(2);
        assert!(matches!(
            ledger.check_chain(),
            Err(LedgerError::ChainIntegrityViolation {
                index: 2,
                fault: IntegrityFault::BrokenLink
            })
        ));
    }

    #[test]
    fn any_tampered_field_invalidates() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().address();
        let mut base = fresh();
        base.mine_next_block(&alice.address()).unwrap();
        base.submit_transfer(&alice, &bob, 40).unwrap();
        base.mine_next_block(&alice.address()).unwrap();
        assert!(base.validate_chain());

        let clone_of = |base: &Ledger| Ledger {
            chain: base.chain.clone(),
            pending: Vec::new(),
            config: base.config,
            store: Arc::new(MemoryStore::new()),
        };

        for index in 0..base.len() {
            let mut l = clone_of(&base);
            let hash = &mut l.chain[index].hash;
            let flipped = if hash.starts_with('0') { "1" } else { "0" };
            hash.replace_range(0..1, flipped);
            assert!(!l.validate_chain(), "hash of block {index}");

            let mut l = clone_of(&base);
            l.chain[index].previous_hash.push('0');
            assert!(!l.validate_chain(), "previous hash of block {index}");

            let mut l = clone_of(&base);
            l.chain[index].timestamp.push('1');
            assert!(!l.validate_chain(), "timestamp of block {index}");
        }

        let mut l = clone_of(&base);
        l.chain[2].transactions[1].outputs[0].amount += 1;
        assert_eq!(violation_index(&l), 2);

        let mut l = clone_of(&base);
        l.chain[1].transactions[0].outputs[0].amount = 1_000_000;
        assert_eq!(violation_index(&l), 1);
    }

    #[test]
    fn validation_does_not_mutate() {
        let mut ledger = fresh();
        ledger
            .mine_next_block(&KeyPair::generate().address())
            .unwrap();
        let snapshot = ledger.chain().to_vec();
        assert!(ledger.validate_chain());
        assert!(ledger.validate_chain());
        assert_eq!(ledger.chain(), snapshot.as_slice());
    }

    #[test]
    fn stale_block_is_rejected_without_side_effects() {
        let mut ledger = fresh();
        let miner = KeyPair::generate().address();
        let mut stale = ledger.prepare_block(&miner).unwrap();
        stale.mine(2);
        ledger.mine_next_block(&miner).unwrap();

        let err = ledger.commit_block(stale).unwrap_err();
        assert!(matches!(err, LedgerError::StaleTip { .. }));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn unmined_block_is_not_committed() {
        let mut ledger = fresh();
        let mut block = ledger
            .prepare_block(&KeyPair::generate().address())
            .unwrap();
        while meets_difficulty(&block.hash, 2) {
            block.nonce += 1;
            block.hash = block.compute_hash();
        }
        assert!(matches!(
            ledger.commit_block(block),
            Err(LedgerError::ChainIntegrityViolation {
                index: 1,
                fault: IntegrityFault::InsufficientWork { .. }
            })
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn reload_restores_chain_and_pool() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().address();
        let (chain, pending) = {
            let mut ledger = Ledger::initialize(test_config(), store.clone()).unwrap();
            ledger.mine_next_block(&alice.address()).unwrap();
            ledger.submit_transfer(&alice, &bob, 10).unwrap();
            (ledger.chain().to_vec(), ledger.pending().to_vec())
        };

        let ledger = Ledger::initialize(test_config(), store).unwrap();
        assert_eq!(ledger.chain(), chain.as_slice());
        assert_eq!(ledger.pending(), pending.as_slice());
        assert!(ledger.validate_chain());
        ledger.shutdown().unwrap();
    }

    /// Store whose writes can be switched off to observe atomicity.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail: AtomicBool,
    }

    impl FlakyStore {
        fn guard(&self) -> StoreResult<()> {
            if self.fail.load(Ordering::Relaxed) {
                Err(StorageError::Aborted)
            } else {
                Ok(())
            }
        }
    }

    impl LedgerStore for FlakyStore {
        fn append_block(&self, block: &Block) -> StoreResult<()> {
            self.guard()?;
            self.inner.append_block(block)
        }
        fn list_blocks(&self) -> StoreResult<Vec<Block>> {
            self.inner.list_blocks()
        }
        fn append_pending(&self, tx: &Transaction) -> StoreResult<()> {
            self.guard()?;
            self.inner.append_pending(tx)
        }
        fn list_pending(&self) -> StoreResult<Vec<Transaction>> {
            self.inner.list_pending()
        }
        fn delete_pending(&self, ids: &HashSet<String>) -> StoreResult<()> {
            self.guard()?;
            self.inner.delete_pending(ids)
        }
    }

    #[test]
    fn failed_writes_leave_state_untouched() {
        let store = Arc::new(FlakyStore::default());
        let mut ledger = Ledger::initialize(test_config(), store.clone()).unwrap();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().address();
        ledger.mine_next_block(&alice.address()).unwrap();
        ledger.mine_next_block(&alice.address()).unwrap();
        ledger.submit_transfer(&alice, &bob, 10).unwrap();

        store.fail.store(true, Ordering::Relaxed);
        assert!(matches!(
            ledger.submit_transfer(&alice, &bob, 10),
            Err(LedgerError::Storage(_))
        ));
        assert!(matches!(
            ledger.mine_next_block(&alice.address()),
            Err(LedgerError::Storage(_))
        ));
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(store.inner.list_blocks().unwrap().len(), 3);
        assert_eq!(store.inner.list_pending().unwrap().len(), 1);
    }
}
