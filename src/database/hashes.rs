use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const HASH_FILE_NAME: &str = "file_hashes.json";

/// SHA-256 digest of a file's text, hex-encoded.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Content hashes of indexed files, keyed by repository-relative path.
/// Persisted as JSON next to the vector table so unchanged files can be
/// skipped on reindex.
#[derive(Debug)]
pub struct FileHashes {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileHashes {
    /// Load hashes from `<index_dir>/file_hashes.json`. A missing or
    /// unreadable file yields an empty map; stale hashes only cost a
    /// re-embed, never correctness.
    pub fn load(index_dir: &Path) -> Self {
        let path = index_dir.join(HASH_FILE_NAME);
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Ignoring corrupt hash file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    #[inline]
    pub fn get(&self, rel_path: &str) -> Option<&str> {
        self.entries.get(rel_path).map(String::as_str)
    }

    #[inline]
    pub fn insert(&mut self, rel_path: String, digest: String) {
        self.entries.insert(rel_path, digest);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist atomically: write to a temp file in the same directory, then
    /// rename into place.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize file hashes")?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        Ok(())
    }
}
