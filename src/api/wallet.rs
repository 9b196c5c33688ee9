use actix_web::{HttpResponse, Responder, post};

use super::models::NewWalletResponse;
use crate::crypto::KeyPair;

/// Generate a fresh key pair. The ledger keeps no copy of the secret.
#[post("/wallet/new/")]
pub async fn create_wallet() -> impl Responder {
    let kp = KeyPair::generate();
    HttpResponse::Ok().json(NewWalletResponse {
        private_key: kp.secret_hex(),
        address: kp.address(),
    })
}
