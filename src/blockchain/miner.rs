use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::oneshot;

use super::Block;
use crate::error::{LedgerError, Result};

/// Proof-of-work running on its own thread. The caller awaits the result,
/// and may cancel it or give it a deadline. Dropping the job, or the future
/// returned by [`MiningJob::finish`], stops the worker.
pub struct MiningJob {
    index: u64,
    cancel: Arc<AtomicBool>,
    result: oneshot::Receiver<Option<Block>>,
}

impl MiningJob {
    pub fn spawn(mut block: Block, difficulty: u32) -> Self {
        let index = block.index;
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let flag = cancel.clone();
        thread::spawn(move || {
            let found = block.mine_cancellable(difficulty, &flag);
            if found {
                debug!("MINER - block #{} solved at nonce {}", block.index, block.nonce);
            }
            // The receiver may be gone if the caller abandoned the job.
            let _ = tx.send(found.then_some(block));
        });
        Self {
            index,
            cancel,
            result: rx,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Ask the worker to stop at its next poll.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the mined block. With a `timeout`, the search is cancelled
    /// once it elapses.
    pub async fn finish(mut self, timeout: Option<Duration>) -> Result<Block> {
        let outcome = match timeout {
            None => (&mut self.result).await,
            Some(limit) => match tokio::time::timeout(limit, &mut self.result).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.cancel();
                    warn!(
                        "MINER - block #{} abandoned after {}s",
                        self.index,
                        limit.as_secs()
                    );
                    return Err(LedgerError::MiningTimedOut(limit.as_secs()));
                }
            },
        };
        match outcome {
            Ok(Some(block)) => Ok(block),
            Ok(None) | Err(_) => Err(LedgerError::MiningCancelled),
        }
    }
}

impl Drop for MiningJob {
    fn drop(&mut self) {
        self.cancel();
    }
}
