use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{Value, json};

use super::{Block, DEFAULT_DIFFICULTY, GENESIS_PREVIOUS_HASH};

/// Failure while persisting or restoring the chain file.
#[derive(Debug)]
pub enum StorageError {
    Io(io::Error),
    Serde(serde_json::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serde(err)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "chain file i/o error: {err}"),
            StorageError::Serde(err) => write!(f, "chain file encoding error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Append-only Proof-of-Work ledger backed by a JSON file.
///
/// The engine owns the chain, the storage path and a single mutex; every
/// public operation takes that mutex, so mutations are strictly serialized
/// and readers never observe a half-appended chain.
pub struct Ledger {
    inner: Mutex<ChainState>,
}

struct ChainState {
    chain: Vec<Block>,
    db_path: PathBuf,
}

impl Ledger {
    /// Open the ledger at `db_path`, restoring a previously persisted chain.
    ///
    /// A missing, unreadable or malformed chain file is treated as "no prior
    /// chain": a genesis block is created and persisted immediately. This
    /// never fails; a persist failure at startup is only logged.
    pub fn open(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let chain = match load_chain(&db_path) {
            Ok(chain) => chain,
            Err(err) => {
                debug!("no usable chain at {}: {err}", db_path.display());
                Vec::new()
            }
        };

        let mut state = ChainState { chain, db_path };
        if state.chain.is_empty() {
            info!("creating ledger with genesis block");
            state.chain.push(Block::genesis(genesis_payload()));
            if let Err(err) = state.save() {
                warn!("failed to persist genesis chain: {err}");
            }
        }

        Self {
            inner: Mutex::new(state),
        }
    }

    /// Mine and append a new block carrying `data`, then persist the chain.
    ///
    /// The nonce search and the disk write both run under the engine lock.
    /// A persist failure does not roll the append back: the block stands in
    /// memory and the error is returned alongside it.
    pub fn append(&self, data: Value) -> (Block, Option<StorageError>) {
        let mut state = self.inner.lock().expect("mutex poisoned");

        let last = state.chain.last().expect("chain always has genesis");
        let mut block = Block::new(last.index + 1, last.hash.clone(), data);
        block.mine(DEFAULT_DIFFICULTY);

        state.chain.push(block.clone());
        let persist_err = state.save().err();
        if let Some(err) = &persist_err {
            warn!("block #{} appended but not persisted: {err}", block.index);
        }

        (block, persist_err)
    }

    /// Validate the entire chain: genesis integrity, linkage and hashes.
    pub fn is_valid(&self) -> bool {
        let state = self.inner.lock().expect("mutex poisoned");
        state.is_valid_chain()
    }

    /// Return the block whose hash equals `hash`, if any.
    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        let state = self.inner.lock().expect("mutex poisoned");
        state.chain.iter().find(|b| b.hash == hash).cloned()
    }

    /// Return the most recent block whose payload is an object carrying
    /// `key` with the exact string `value`. Non-object payloads are skipped.
    pub fn find_by_field(&self, key: &str, value: &str) -> Option<Block> {
        let state = self.inner.lock().expect("mutex poisoned");
        state
            .chain
            .iter()
            .rev()
            .find(|block| {
                block
                    .data
                    .as_object()
                    .and_then(|payload| payload.get(key))
                    .and_then(Value::as_str)
                    == Some(value)
            })
            .cloned()
    }

    /// Clone the full chain for bulk reads/export.
    pub fn snapshot(&self) -> Vec<Block> {
        let state = self.inner.lock().expect("mutex poisoned");
        state.chain.clone()
    }

    pub fn len(&self) -> usize {
        let state = self.inner.lock().expect("mutex poisoned");
        state.chain.len()
    }
}

impl ChainState {
    /// Overwrite the chain file with the full chain as one JSON array.
    fn save(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.chain)?;
        fs::write(&self.db_path, json)?;
        Ok(())
    }

    fn is_valid_chain(&self) -> bool {
        if self.chain.is_empty() {
            return false;
        }

        // Validate genesis block immutability
        let genesis = &self.chain[0];
        if genesis.index != 0
            || genesis.previous_hash != GENESIS_PREVIOUS_HASH
            || genesis.hash != genesis.compute_hash()
        {
            return false;
        }

        // Validate the rest of the chain
        for i in 1..self.chain.len() {
            let current = &self.chain[i];
            let prev = &self.chain[i - 1];

            // Check linkage
            if current.previous_hash != prev.hash {
                return false;
            }

            // Check hash integrity
            if current.hash != current.compute_hash() {
                return false;
            }
        }

        true
    }
}

fn load_chain(path: &Path) -> Result<Vec<Block>, StorageError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn genesis_payload() -> Value {
    json!({
        "message": "Genesis block of the illegal dumping detection ledger",
        "creator": "EMLURB Recife",
        "date": Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use serde_json::json;

    use super::{Block, GENESIS_PREVIOUS_HASH, Ledger};

    fn open_temp() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ledger = Ledger::open(dir.path().join("chain.json"));
        (dir, ledger)
    }

    fn tamper(ledger: &Ledger, index: usize, mutate: impl FnOnce(&mut Block)) {
        let mut state = ledger.inner.lock().unwrap();
        mutate(&mut state.chain[index]);
    }

    #[test]
    fn open_creates_and_persists_genesis() {
        let (dir, ledger) = open_temp();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_valid());
        assert!(dir.path().join("chain.json").exists());

        let genesis = &ledger.snapshot()[0];
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
    }

    #[test]
    fn append_keeps_chain_valid_and_gap_free() {
        let (_dir, ledger) = open_temp();
        for i in 0..3 {
            let (block, persist_err) = ledger.append(json!({ "detection_id": format!("det-{i}") }));
            assert!(persist_err.is_none());
            assert!(block.hash.starts_with("00"));
            assert!(ledger.is_valid());
        }

        let chain = ledger.snapshot();
        assert_eq!(chain.len(), 4);
        for (i, block) in chain.iter().enumerate() {
            assert_eq!(block.index, i as u64);
        }
    }

    #[test]
    fn tampering_with_any_field_invalidates() {
        let cases: Vec<fn(&mut Block)> = vec![
            |b| b.data = json!({ "detection_id": "forged" }),
            |b| b.nonce += 1,
            |b| b.hash = "0".repeat(64),
            |b| b.previous_hash = "deadbeef".into(),
        ];

        for mutate in cases {
            let (_dir, ledger) = open_temp();
            ledger.append(json!({ "detection_id": "det-1" }));
            assert!(ledger.is_valid());

            tamper(&ledger, 1, mutate);
            assert!(!ledger.is_valid());
        }
    }

    #[test]
    fn tampered_genesis_is_detected() {
        let (_dir, ledger) = open_temp();
        tamper(&ledger, 0, |b| b.data = json!({ "message": "rewritten" }));
        assert!(!ledger.is_valid());
    }

    #[test]
    fn save_then_load_reproduces_the_chain() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("chain.json");

        let original = {
            let ledger = Ledger::open(&path);
            ledger.append(json!({ "detection_id": "det-1" }));
            ledger.append(json!({ "site": "mangue" }));
            ledger.snapshot()
        };

        let reopened = Ledger::open(&path);
        assert_eq!(reopened.snapshot(), original);
        assert!(reopened.is_valid());
    }

    #[test]
    fn malformed_chain_file_falls_back_to_genesis() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("chain.json");
        std::fs::write(&path, "not json at all").expect("write file");

        let ledger = Ledger::open(&path);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_valid());
    }

    #[test]
    fn block_lookup_by_hash() {
        let (_dir, ledger) = open_temp();
        let (block, _) = ledger.append(json!({ "detection_id": "det-1" }));
        let genesis_hash = ledger.snapshot()[0].hash.clone();

        assert_eq!(ledger.block_by_hash(&block.hash).map(|b| b.index), Some(1));
        assert_eq!(ledger.block_by_hash(&genesis_hash).map(|b| b.index), Some(0));
        assert!(ledger.block_by_hash("missing").is_none());
    }

    #[test]
    fn search_returns_most_recent_match() {
        let (_dir, ledger) = open_temp();
        ledger.append(json!({ "detection_id": "A" }));
        ledger.append(json!({ "detection_id": "B" }));
        let (third, _) = ledger.append(json!({ "detection_id": "A" }));

        let found = ledger.find_by_field("detection_id", "A").expect("match");
        assert_eq!(found.index, third.index);
        assert!(ledger.find_by_field("detection_id", "C").is_none());
    }

    #[test]
    fn search_skips_non_object_payloads() {
        let (_dir, ledger) = open_temp();
        ledger.append(json!("free-form note"));
        ledger.append(json!({ "detection_id": "A" }));
        ledger.append(json!(42));

        let found = ledger.find_by_field("detection_id", "A").expect("match");
        assert_eq!(found.index, 2);
    }

    #[test]
    fn append_survives_persist_failure() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ledger = Ledger::open(dir.path().join("chain.json"));

        // Point the engine at a path whose parent does not exist
        {
            let mut state = ledger.inner.lock().unwrap();
            state.db_path = dir.path().join("missing").join("chain.json");
        }

        let (block, persist_err) = ledger.append(json!({ "detection_id": "det-1" }));
        assert!(persist_err.is_some());
        assert_eq!(block.index, 1);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_valid());
    }

    #[test]
    fn concurrent_appends_are_strictly_serialized() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ledger = Arc::new(Ledger::open(dir.path().join("chain.json")));
        let initial = ledger.len();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    ledger.append(json!({ "detection_id": format!("det-{i}") }));
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("append thread panicked");
        }

        assert_eq!(ledger.len(), initial + 8);
        assert!(ledger.is_valid());
        for (i, block) in ledger.snapshot().iter().enumerate() {
            assert_eq!(block.index, i as u64);
        }
    }
}
