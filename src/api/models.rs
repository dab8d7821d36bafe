use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ledger::{Block, Ledger};

/// Shared application state owning the ledger engine.
pub struct AppState {
    pub ledger: Ledger,
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub difficulty: usize,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Deserialize)]
pub struct MineRequest {
    pub data: Option<Value>,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub index: u64,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: usize,
    pub persisted: bool,
}

/* ---------- Lookup API Models ---------- */

#[derive(Deserialize)]
pub struct SearchQuery {
    pub detection_id: Option<String>,
}

/* ---------- Shared ---------- */

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
}
