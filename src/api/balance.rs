use actix_web::{HttpResponse, Responder, get, web};

use super::models::{BalanceResponse, HistoryResponse};
use crate::service::LedgerService;

#[get("/balance/{address}/")]
pub async fn get_balance(
    state: web::Data<LedgerService>,
    path: web::Path<(String,)>,
) -> impl Responder {
    let address = path.into_inner().0;
    let utxos = state.unspent_outputs(&address);
    let balance = utxos.iter().map(|u| u.amount as u128).sum();

    HttpResponse::Ok().json(BalanceResponse {
        address,
        balance,
        utxos: utxos.len(),
    })
}

#[get("/history/{address}/")]
pub async fn get_history(
    state: web::Data<LedgerService>,
    path: web::Path<(String,)>,
) -> impl Responder {
    let address = path.into_inner().0;
    let transactions = state.history(&address);
    HttpResponse::Ok().json(HistoryResponse {
        address,
        transactions,
    })
}
