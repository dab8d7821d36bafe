use actix_web::{HttpResponse, Responder, get};
use chrono::Utc;

use super::models::HealthResponse;

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}
