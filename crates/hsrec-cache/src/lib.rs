//! On-disk result cache.
//!
//! Two tiers with distinct lifetimes: `index/` holds built artifacts keyed
//! by corpus fingerprint (wholesale invalidation, never partial updates),
//! `queries/` holds ranked result lists keyed by (corpus, query, config)
//! fingerprints. A miss is always a valid outcome: corrupt, unreadable or
//! mismatched blobs are misses, and the engine must produce correct results
//! with the cache entirely absent, only slower.
//!
//! Reads are plain lock-free file reads. Writes go through a tempfile and an
//! atomic rename in the target directory, so concurrent writers for the same
//! key settle last-writer-wins with no torn blobs.

pub mod keys;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use hsrec_core::types::Candidate;
use hsrec_core::{Error, Result};

/// Persisted ranked result list for one query-cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedQueryResult {
    pub corpus_fingerprint: String,
    pub config_fingerprint: String,
    pub created_at: String,
    pub candidates: Vec<Candidate>,
    pub semantic_used: bool,
}

impl CachedQueryResult {
    pub fn new(
        corpus_fingerprint: impl Into<String>,
        config_fingerprint: impl Into<String>,
        candidates: Vec<Candidate>,
        semantic_used: bool,
    ) -> Self {
        Self {
            corpus_fingerprint: corpus_fingerprint.into(),
            config_fingerprint: config_fingerprint.into(),
            created_at: Utc::now().to_rfc3339(),
            candidates,
            semantic_used,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub root: PathBuf,
    pub index_blobs: usize,
    pub query_entries: usize,
    pub total_bytes: u64,
}

/// Handle on one cache directory. Cheap to clone paths from; holds no open
/// files and no locks.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Open a store rooted at `root`. Nothing is created until the first
    /// write.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.root.join("index").join(format!("{name}.json"))
    }

    fn query_path(&self, key: &str) -> PathBuf {
        self.root.join("queries").join(format!("{key}.json"))
    }

    /// Fetch a built-index artifact by name. Validation against the live
    /// corpus fingerprint is the caller's job; this only guarantees a
    /// well-formed blob or `None`.
    pub fn get_index<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        read_json(&self.index_path(name))
    }

    pub fn put_index<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        write_json_atomic(&self.index_path(name), value)
    }

    /// Fetch a query-cache entry. An entry recorded under a corpus
    /// fingerprint other than `live_corpus_fp` is treated as absent, not as
    /// stale-but-usable.
    pub fn get_query(&self, key: &str, live_corpus_fp: &str) -> Option<CachedQueryResult> {
        let value: CachedQueryResult = read_json(&self.query_path(key))?;
        if value.corpus_fingerprint != live_corpus_fp {
            warn!(key, "query cache entry is for another corpus, ignoring");
            return None;
        }
        Some(value)
    }

    pub fn put_query(&self, key: &str, value: &CachedQueryResult) -> Result<()> {
        write_json_atomic(&self.query_path(key), value)
    }

    pub fn stats(&self) -> CacheStats {
        let (index_blobs, index_bytes) = dir_totals(&self.root.join("index"));
        let (query_entries, query_bytes) = dir_totals(&self.root.join("queries"));
        CacheStats {
            root: self.root.clone(),
            index_blobs,
            query_entries,
            total_bytes: index_bytes + query_bytes,
        }
    }

    /// Delete every cached blob. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in [self.root.join("index"), self.root.join("queries")] {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.filter_map(|e| e.ok()) {
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    fs::remove_file(entry.path())?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

fn dir_totals(dir: &Path) -> (usize, u64) {
    let mut count = 0;
    let mut bytes = 0;
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.filter_map(|e| e.ok()) {
            if let Ok(meta) = entry.metadata() {
                if meta.is_file() {
                    count += 1;
                    bytes += meta.len();
                }
            }
        }
    }
    (count, bytes)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("corrupt cache blob {}: {e}, treating as miss", path.display());
            None
        }
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::CacheWrite(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(dir).map_err(|e| Error::CacheWrite(e.to_string()))?;
    let bytes = serde_json::to_vec(value).map_err(|e| Error::CacheWrite(e.to_string()))?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::CacheWrite(e.to_string()))?;
    io::Write::write_all(&mut tmp, &bytes).map_err(|e| Error::CacheWrite(e.to_string()))?;
    tmp.persist(path).map_err(|e| Error::CacheWrite(e.to_string()))?;
    Ok(())
}
