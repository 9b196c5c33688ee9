//! Single-node, proof-of-work ledger with UTXO accounting and secp256k1
//! signatures, plus a thin HTTP surface over it.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod service;
pub mod storage;
pub mod transaction;

pub use error::{LedgerError, Result};
