use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::models::{
    AppState, ChainResponse, ErrorResponse, MineRequest, MineResponse, ValidateResponse,
};
use crate::ledger::DEFAULT_DIFFICULTY;

/// Get the full chain.
#[get("/chain")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let chain = state.ledger.snapshot();
    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        difficulty: DEFAULT_DIFFICULTY,
        chain,
    })
}

/// Validate the whole chain.
#[get("/validate")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ValidateResponse {
        valid: state.ledger.is_valid(),
        length: state.ledger.len(),
    })
}

/// Mine a new block carrying the submitted payload.
#[post("/mine")]
pub async fn mine_block(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let Some(data) = req.into_inner().data else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "data is required",
        });
    };

    let (block, persist_err) = state.ledger.append(data);
    info!(
        "mined block #{} (hash={}, nonce={})",
        block.index, block.hash, block.nonce
    );

    HttpResponse::Ok().json(MineResponse {
        index: block.index,
        hash: block.hash,
        nonce: block.nonce,
        difficulty: DEFAULT_DIFFICULTY,
        persisted: persist_err.is_none(),
    })
}
