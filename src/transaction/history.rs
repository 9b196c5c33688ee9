use serde::Serialize;

use super::model::{Transaction, TxKind};
use crate::blockchain::Block;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Send,
    Receive,
    Reward,
}

/// One confirmed transaction as seen from a single address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub tx_id: String,
    pub block_index: u64,
    pub timestamp: String,
    pub kind: HistoryKind,
    pub counterparty: String,
    pub amount: u64,
}

/// Replay the chain and list every transaction touching `address`, newest first.
pub fn history_for(chain: &[Block], address: &str) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = chain
        .iter()
        .flat_map(|block| {
            block
                .transactions
                .iter()
                .filter_map(move |tx| entry_for(block, tx, address))
        })
        .collect();
    entries.reverse();
    entries
}

fn entry_for(block: &Block, tx: &Transaction, address: &str) -> Option<HistoryEntry> {
    let paid_to_me = tx.outputs.iter().find(|o| o.address == address);
    let (kind, counterparty, amount) = match &tx.kind {
        TxKind::Reward { .. } => {
            let out = paid_to_me?;
            (HistoryKind::Reward, String::from("mining reward"), out.amount)
        }
        TxKind::Transfer { inputs } if inputs.iter().any(|i| i.address == address) => {
            match tx.outputs.iter().find(|o| o.address != address) {
                Some(out) => (HistoryKind::Send, out.address.clone(), out.amount),
                None => (
                    HistoryKind::Send,
                    address.to_string(),
                    tx.outputs.first().map_or(0, |o| o.amount),
                ),
            }
        }
        TxKind::Transfer { inputs } => {
            let out = paid_to_me?;
            let from = inputs
                .first()
                .map_or_else(String::new, |i| i.address.clone());
            (HistoryKind::Receive, from, out.amount)
        }
    };

    Some(HistoryEntry {
        tx_id: tx.id.clone(),
        block_index: block.index,
        timestamp: block.timestamp.clone(),
        kind,
        counterparty,
        amount,
    })
}
