use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, ErrorResponse, SearchQuery};

/// Get a single block by its hash.
#[get("/blocks/{hash}")]
pub async fn get_block(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let hash = path.into_inner().0;
    match state.ledger.block_by_hash(&hash) {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().json(ErrorResponse {
            error: "block not found",
        }),
    }
}

/// Find the most recent block recorded for a detection_id.
#[get("/search")]
pub async fn search_block(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let detection_id = query.into_inner().detection_id.unwrap_or_default();
    if detection_id.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "detection_id is required",
        });
    }

    match state.ledger.find_by_field("detection_id", &detection_id) {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().json(ErrorResponse {
            error: "no block found for this detection_id",
        }),
    }
}
