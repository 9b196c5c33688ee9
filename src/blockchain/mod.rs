pub mod block;
pub mod ledger;
pub mod miner;

pub use block::{Block, IntegrityFault, meets_difficulty};
pub use ledger::Ledger;
pub use miner::MiningJob;

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// A SHA-256 hex digest has 64 digits; no hash can meet a higher target.
pub const MAX_DIFFICULTY: u32 = 64;

/// Reward paid to whoever mines a block.
pub const DEFAULT_MINING_REWARD: u64 = 100;

/// Transactions per block, the reward included.
pub const DEFAULT_BLOCK_CAPACITY: usize = 5;

/// Mining restarts allowed when the tip moves under a running search.
pub const DEFAULT_MINING_ATTEMPTS: u32 = 3;
