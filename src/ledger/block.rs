use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::GENESIS_PREVIOUS_HASH;

/// A single block in the ledger holding an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix timestamp (UTC)
    pub data: Value,
    pub previous_hash: String,
    pub hash: String, // Cached hash of the block
    pub nonce: u64,   // Proof-of-Work nonce
}

impl Block {
    /// Create the genesis block (first block in the chain).
    ///
    /// Genesis is hashed once with nonce 0 and is not subject to the
    /// Proof-of-Work difficulty.
    pub fn genesis(data: Value) -> Self {
        let mut block = Self {
            index: 0,
            timestamp: Utc::now().timestamp(),
            data,
            previous_hash: String::from(GENESIS_PREVIOUS_HASH),
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Create a new block (not mined yet). Call `mine()` to perform PoW.
    pub fn new(index: u64, previous_hash: String, data: Value) -> Self {
        let mut block = Self {
            index,
            timestamp: Utc::now().timestamp(),
            data,
            previous_hash,
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Compute the SHA-256 hash of this block using its fields
    /// (excluding the `hash` field itself). The payload is serialized as
    /// compact JSON and concatenated with the remaining fields in a fixed
    /// order: index, timestamp, data, previous_hash, nonce.
    pub fn compute_hash(&self) -> String {
        let data_json = serde_json::to_string(&self.data).expect("serialize payload");
        let preimage = format!(
            "{}{}{}{}{}",
            self.index, self.timestamp, data_json, self.previous_hash, self.nonce
        );
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)
    }

    /// Perform Proof-of-Work by finding a nonce that yields a hash
    /// starting with `difficulty` leading zeros (in hex).
    pub fn mine(&mut self, difficulty: usize) {
        let target_prefix = "0".repeat(difficulty);
        loop {
            self.hash = self.compute_hash();
            if self.hash.starts_with(&target_prefix) {
                break;
            }
            self.nonce = self.nonce.wrapping_add(1);
        }
    }
}
