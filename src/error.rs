use thiserror::Error;

use crate::blockchain::IntegrityFault;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid transaction shape: {0}")]
    InvalidTransactionShape(String),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u128 },

    #[error("chain integrity violation at block {index}: {fault}")]
    ChainIntegrityViolation { index: u64, fault: IntegrityFault },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("stale block: parent {expected} is no longer the tip ({actual})")]
    StaleTip { expected: String, actual: String },

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("mining timed out after {0} seconds")]
    MiningTimedOut(u64),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("block {index} does not extend the stored log (next index is {expected})")]
    OutOfOrder { index: u64, expected: u64 },

    #[error("storage transaction aborted")]
    Aborted,

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    NotANumber { name: &'static str, value: String },

    #[error("{name} must be at least {min}")]
    TooSmall { name: &'static str, min: u64 },

    #[error("{name} must be at most {max}")]
    TooLarge { name: &'static str, max: u64 },
}
