mod balance;
mod chain;
mod health;
pub mod models;
mod tx;
mod wallet;

use actix_web::http::StatusCode;
use actix_web::web::{self, ServiceConfig};
use actix_web::{HttpResponse, ResponseError};

use crate::error::LedgerError;
use models::ErrorResponse;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::mine_block)
            .service(tx::post_transfer)
            .service(tx::get_mempool)
            .service(balance::get_balance)
            .service(balance::get_history)
            .service(wallet::create_wallet),
    );
}

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::InvalidTransactionShape(_)
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            LedgerError::StaleTip { .. } => StatusCode::CONFLICT,
            LedgerError::MiningTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            LedgerError::ChainIntegrityViolation { .. }
            | LedgerError::MiningCancelled
            | LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
