use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::blockchain::Block;

/// Identifies a specific transaction output by its tx id and position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: String,
    pub index: u32,
}

/// An unspent output owned by some address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub amount: u64,
    pub address: String,
}

/// Every output paid to `address` that no input signed by `address` consumes,
/// oldest first. Pure function of the chain: two passes over every transaction.
pub fn unspent_outputs_for(chain: &[Block], address: &str) -> Vec<Utxo> {
    let spent: HashSet<OutPoint> = chain
        .iter()
        .flat_map(|block| &block.transactions)
        .flat_map(|tx| tx.inputs())
        .filter(|input| input.address == address)
        .map(|input| input.outpoint())
        .collect();

    let mut utxos = Vec::new();
    for tx in chain.iter().flat_map(|block| &block.transactions) {
        for (i, out) in tx.outputs.iter().enumerate() {
            if out.address != address {
                continue;
            }
            let outpoint = OutPoint {
                tx_id: tx.id.clone(),
                index: i as u32,
            };
            if !spent.contains(&outpoint) {
                utxos.push(Utxo {
                    outpoint,
                    amount: out.amount,
                    address: out.address.clone(),
                });
            }
        }
    }
    utxos
}

pub fn balance_for(chain: &[Block], address: &str) -> u128 {
    unspent_outputs_for(chain, address)
        .iter()
        .map(|u| u.amount as u128)
        .sum()
}
