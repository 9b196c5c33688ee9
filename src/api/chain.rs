use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::models::{ChainResponse, MineRequest, MineResponse, ValidateResponse};
use crate::error::LedgerError;
use crate::service::LedgerService;

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<LedgerService>) -> impl Responder {
    let chain = state.chain();
    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        difficulty: state.difficulty(),
        chain,
    })
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<LedgerService>) -> impl Responder {
    let (failed_index, reason) = match state.check_chain() {
        Ok(()) => (None, None),
        Err(LedgerError::ChainIntegrityViolation { index, fault }) => {
            (Some(index), Some(fault.to_string()))
        }
        Err(e) => (None, Some(e.to_string())),
    };
    HttpResponse::Ok().json(ValidateResponse {
        valid: reason.is_none(),
        length: state.height(),
        failed_index,
        reason,
    })
}

/// Mine a block: reward to `miner_address` plus the oldest pending transfers.
#[post("/mine/")]
pub async fn mine_block(
    state: web::Data<LedgerService>,
    req: web::Json<MineRequest>,
) -> Result<HttpResponse, LedgerError> {
    let block = state.mine(req.miner_address.trim()).await?;
    info!(
        "POST /mine/ - sealed block #{} (hash={}, nonce={})",
        block.index, block.hash, block.nonce
    );
    Ok(HttpResponse::Ok().json(MineResponse {
        mined_index: block.index,
        hash: block.hash,
        nonce: block.nonce,
        transactions: block.transactions.len(),
    }))
}
