use actix_web::{HttpResponse, get, post, web};
use log::{debug, info, warn};
use std::time::Instant;

use super::models::{MempoolResponse, TransferRequest, TransferResponse};
use crate::crypto::KeyPair;
use crate::error::LedgerError;
use crate::service::LedgerService;

/// Build, sign and queue a transfer from the holder of `private_key`.
#[post("/tx/")]
pub async fn post_transfer(
    state: web::Data<LedgerService>,
    body: web::Json<TransferRequest>,
) -> Result<HttpResponse, LedgerError> {
    let t0 = Instant::now();
    let body = body.into_inner();
    debug!(
        "POST /tx/ - received: recipient={}, amount={}",
        body.recipient, body.amount
    );

    let sender = KeyPair::from_secret_hex(&body.private_key)?;
    let transaction = state
        .submit_transfer(&sender, &body.recipient, body.amount)
        .inspect_err(|e| warn!("POST /tx/ - rejected: {e}"))?;

    info!(
        "POST /tx/ - txid={} OK ({} ms)",
        transaction.id,
        t0.elapsed().as_millis()
    );
    Ok(HttpResponse::Created().json(TransferResponse { transaction }))
}

/// List current mempool (just txids to keep it compact).
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<LedgerService>) -> HttpResponse {
    let pending = state.pending();
    HttpResponse::Ok().json(MempoolResponse {
        size: pending.len(),
        transactions: pending.into_iter().map(|t| t.id).collect(),
    })
}
