use serde::{Deserialize, Serialize};

use crate::blockchain::Block;
use crate::transaction::{HistoryEntry, Transaction};

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub difficulty: u32,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    /// Index of the first offending block, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct MineRequest {
    pub miner_address: String,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub mined_index: u64,
    pub hash: String,
    pub nonce: u64,
    pub transactions: usize,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct TransferRequest {
    /// Hex secret of the sender; used for signing and then dropped.
    pub private_key: String,
    pub recipient: String,
    pub amount: u64,
}

#[derive(Serialize)]
pub struct TransferResponse {
    pub transaction: Transaction,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<String>, // list txids for brevity
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u128,
    pub utxos: usize,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub address: String,
    pub transactions: Vec<HistoryEntry>,
}

#[derive(Serialize)]
pub struct NewWalletResponse {
    pub private_key: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
