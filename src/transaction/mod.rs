pub mod history;
pub mod model;
pub mod utxo;

pub use history::{HistoryEntry, HistoryKind, history_for};
pub use model::{Transaction, TxInput, TxKind, TxOutput};
pub use utxo::{OutPoint, Utxo, balance_for, unspent_outputs_for};
