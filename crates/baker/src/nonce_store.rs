//! The only state that survives a restart: outstanding commitment nonces.
//!
//! Writes are whole-list; a failed write is logged and the in-memory list
//! stays authoritative for the rest of the process lifetime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A commitment made at `level`: the seed we must reveal in the next cycle
/// and the hash we committed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce {
    pub level: i64,
    /// 32 bytes of seed, hex.
    pub seed: String,
    /// Base58 `nce...` form of blake2b(seed).
    pub seed_nonce_hash: String,
    pub injected_block_hash: String,
    pub revealed: bool,
}

pub struct NonceStore {
    path: PathBuf,
}

impl NonceStore {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    /// Empty when the file does not exist yet; a corrupt file is treated the
    /// same way after a warning.
    pub fn load(&self) -> Vec<Nonce> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&text) {
            Ok(list) => list,
            Err(e) => {
                log::warn!("nonces: {} is not a nonce list ({}), starting empty", self.path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn save(&self, nonces: &[Nonce]) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let bytes = serde_json::to_vec_pretty(nonces).expect("nonce list serializes");
        if let Err(e) = std::fs::write(&self.path, bytes) {
            log::error!("nonces: failed to write {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(level: i64) -> Nonce {
        Nonce {
            level,
            seed: "ab".repeat(32),
            seed_nonce_hash: "nce000".to_string(),
            injected_block_hash: "B000".to_string(),
            revealed: false,
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = NonceStore::new(&dir.path().join("nonces.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = NonceStore::new(&dir.path().join("sub/nonces.json"));
        let list = vec![sample(4128), sample(4160)];
        store.save(&list);
        assert_eq!(store.load(), list);
    }

    #[test]
    fn whole_list_rewrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = NonceStore::new(&dir.path().join("nonces.json"));
        store.save(&[sample(1), sample(2)]);
        store.save(&[sample(2)]);
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonces.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(NonceStore::new(&path).load().is_empty());
    }
}
