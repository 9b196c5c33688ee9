use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::utxo::OutPoint;
use crate::crypto::{KeyPair, sha256_hex, verify_signature};
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Id of the transaction whose output is being spent.
    pub source_tx_id: String,
    pub output_index: u32,
    /// Address (hex public key) that owns the referenced output.
    pub address: String,
    /// Hex-encoded DER ECDSA signature over the transaction id. Empty until signed.
    #[serde(default)]
    pub signature: String,
}

impl TxInput {
    pub fn unsigned(outpoint: OutPoint, address: impl Into<String>) -> Self {
        Self {
            source_tx_id: outpoint.tx_id,
            output_index: outpoint.index,
            address: address.into(),
            signature: String::new(),
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            tx_id: self.source_tx_id.clone(),
            index: self.output_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub address: String,
}

/// What a transaction is: freshly minted value paid to a miner, or a transfer
/// that spends earlier outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxKind {
    /// Height of the block that mints it; part of the id so rewards never collide.
    Reward { height: u64 },
    Transfer { inputs: Vec<TxInput> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// SHA-256 over the inputs (without signatures) and outputs.
    pub id: String,
    #[serde(flatten)]
    pub kind: TxKind,
    pub outputs: Vec<TxOutput>,
}

/// Input as it enters the id preimage: signatures are excluded because they sign the id.
#[derive(Serialize)]
struct IdInput<'a> {
    source_tx_id: &'a str,
    output_index: u32,
    address: &'a str,
}

#[derive(Serialize)]
struct IdReward {
    reward_height: u64,
}

impl Transaction {
    /// Build a transfer and compute its id. Rejects empty inputs/outputs,
    /// zero amounts and an outpoint spent twice.
    pub fn create(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self> {
        if inputs.is_empty() {
            return Err(LedgerError::InvalidTransactionShape(
                "a transfer must spend at least one output".into(),
            ));
        }
        check_outputs(&outputs)?;

        let mut seen = HashSet::new();
        for input in &inputs {
            if !seen.insert((input.source_tx_id.as_str(), input.output_index)) {
                return Err(LedgerError::InvalidTransactionShape(format!(
                    "outpoint {}:{} spent twice",
                    input.source_tx_id, input.output_index
                )));
            }
        }

        let mut tx = Self {
            id: String::new(),
            kind: TxKind::Transfer { inputs },
            outputs,
        };
        tx.id = tx.compute_id();
        Ok(tx)
    }

    /// Build the reward transaction for the block at `height`.
    pub fn reward(height: u64, miner_address: impl Into<String>, amount: u64) -> Result<Self> {
        let outputs = vec![TxOutput {
            amount,
            address: miner_address.into(),
        }];
        check_outputs(&outputs)?;
        let mut tx = Self {
            id: String::new(),
            kind: TxKind::Reward { height },
            outputs,
        };
        tx.id = tx.compute_id();
        Ok(tx)
    }

    pub fn is_reward(&self) -> bool {
        matches!(self.kind, TxKind::Reward { .. })
    }

    /// Inputs of a transfer; a reward has none.
    pub fn inputs(&self) -> &[TxInput] {
        match &self.kind {
            TxKind::Reward { .. } => &[],
            TxKind::Transfer { inputs } => inputs,
        }
    }

    pub fn total_output_amount(&self) -> u128 {
        self.outputs.iter().map(|o| o.amount as u128).sum()
    }

    /// Recompute the content-derived id.
    pub fn compute_id(&self) -> String {
        let head = match &self.kind {
            TxKind::Reward { height } => serde_json::to_vec(&IdReward {
                reward_height: *height,
            }),
            TxKind::Transfer { inputs } => {
                let lite: Vec<IdInput<'_>> = inputs
                    .iter()
                    .map(|i| IdInput {
                        source_tx_id: &i.source_tx_id,
                        output_index: i.output_index,
                        address: &i.address,
                    })
                    .collect();
                serde_json::to_vec(&lite)
            }
        };
        // Plain structs of strings and integers always serialize.
        let mut preimage = head.expect("serialize id inputs");
        preimage.extend(serde_json::to_vec(&self.outputs).expect("serialize id outputs"));
        sha256_hex(&preimage)
    }

    /// Sign every input with `keypair`. The caller picks the key matching the
    /// inputs' address; a reward has nothing to sign.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        let signature = keypair.sign_digest_hex(&self.id)?;
        if let TxKind::Transfer { inputs } = &mut self.kind {
            for input in inputs.iter_mut() {
                input.signature = signature.clone();
            }
        }
        Ok(())
    }

    /// Sign a single input, for transfers that combine outputs of several owners.
    pub fn sign_input(&mut self, index: usize, keypair: &KeyPair) -> Result<()> {
        let signature = keypair.sign_digest_hex(&self.id)?;
        match &mut self.kind {
            TxKind::Transfer { inputs } if index < inputs.len() => {
                inputs[index].signature = signature;
                Ok(())
            }
            _ => Err(LedgerError::InvalidTransactionShape(format!(
                "no input at position {index}"
            ))),
        }
    }

    /// Rewards always verify. A transfer verifies when its id matches its
    /// content and every input carries a valid signature by the key named in
    /// its address. Never errors: malformed data is simply `false`.
    pub fn verify(&self) -> bool {
        match &self.kind {
            TxKind::Reward { .. } => true,
            TxKind::Transfer { inputs } => {
                if inputs.is_empty() || self.id != self.compute_id() {
                    return false;
                }
                inputs
                    .iter()
                    .all(|input| verify_signature(&input.address, &self.id, &input.signature))
            }
        }
    }
}

fn check_outputs(outputs: &[TxOutput]) -> Result<()> {
    if outputs.is_empty() {
        return Err(LedgerError::InvalidTransactionShape(
            "transaction must have at least one output".into(),
        ));
    }
    if outputs.iter().any(|o| o.amount == 0) {
        return Err(LedgerError::InvalidTransactionShape(
            "output amount must be > 0".into(),
        ));
    }
    Ok(())
}
