use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;

use crate::service::LedgerService;

#[get("/health/")]
pub async fn health_check(state: web::Data<LedgerService>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "up",
        "height": state.height(),
    }))
}
