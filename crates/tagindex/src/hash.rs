//! Content hashing with a per-path memo.
//!
//! Hashes are memoized by path for the lifetime of the process. Each memo
//! entry remembers the size and modification time it was computed from, so a
//! file rewritten in place is hashed again instead of reusing a stale digest.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IndexError, Result};

/// Size and modification time of a file, used to detect content changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl Fingerprint {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }

    pub fn of_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|error| IndexError::from_io_at(path, error))?;
        Ok(Self::from_metadata(&metadata))
    }
}

/// Lower-case hex SHA-256 digest of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads a file, mapping a vanished path to [`IndexError::NotFound`].
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|error| IndexError::from_io_at(path, error))
}

#[derive(Debug, Default)]
pub struct HashMemo {
    entries: Mutex<HashMap<PathBuf, (Fingerprint, ContentHash)>>,
}

impl HashMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized hash if it was computed from the same fingerprint.
    pub fn lookup(&self, path: &Path, fingerprint: Fingerprint) -> Option<ContentHash> {
        let entries = self.entries.lock();
        entries
            .get(path)
            .filter(|(known, _)| *known == fingerprint)
            .map(|(_, hash)| hash.clone())
    }

    pub fn insert(&self, path: PathBuf, fingerprint: Fingerprint, hash: ContentHash) {
        self.entries.lock().insert(path, (fingerprint, hash));
    }

    /// Returns the hash of `path`, reading the file only on a memo miss.
    pub fn hash_file(&self, path: &Path, fingerprint: Fingerprint) -> Result<ContentHash> {
        if let Some(hash) = self.lookup(path, fingerprint) {
            return Ok(hash);
        }
        // Read outside the lock; concurrent misses on one path hash twice.
        let hash = ContentHash::of_bytes(&read_bytes(path)?);
        self.insert(path.to_path_buf(), fingerprint, hash.clone());
        Ok(hash)
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&self, mut keep: impl FnMut(&Path, Fingerprint) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|path, (fingerprint, _)| keep(path, *fingerprint));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
