//! Corpus store: loads the reference taxonomy into an indexed, fingerprinted
//! in-memory form.
//!
//! The ingest boundary is JSON-lines, one entry per row; loaders for the raw
//! upstream file formats live outside the engine. Malformed rows are skipped
//! and counted, and the load fails only when the skip ratio exceeds the
//! configured threshold.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::types::Entry;

#[derive(Debug, Clone)]
pub struct Corpus {
    entries: Vec<Entry>,
    by_code: HashMap<String, usize>,
    fingerprint: String,
    skipped: usize,
}

impl Corpus {
    /// Load from a `.jsonl` file or a directory of them (walked recursively,
    /// files visited in path order so the fingerprint is stable).
    pub fn load(path: &Path, config: &EngineConfig) -> Result<Self> {
        let files = source_files(path)?;
        if files.is_empty() {
            return Err(Error::CorpusIntegrity(format!(
                "no .jsonl source under {}",
                path.display()
            )));
        }
        let mut builder = CorpusBuilder::new();
        for file in &files {
            let reader = BufReader::new(File::open(file)?);
            builder.read_rows(reader)?;
        }
        let corpus = builder.finish(config)?;
        info!(
            entries = corpus.len(),
            skipped = corpus.skipped(),
            fingerprint = %corpus.fingerprint(),
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// Load from any reader of JSON-lines. Used by `load` and by tests.
    pub fn from_reader(reader: impl Read, config: &EngineConfig) -> Result<Self> {
        let mut builder = CorpusBuilder::new();
        builder.read_rows(BufReader::new(reader))?;
        builder.finish(config)
    }

    /// O(1) lookup by exact code.
    pub fn lookup(&self, code: &str) -> Result<&Entry> {
        self.by_code
            .get(code)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::NotFound(format!("code {code}")))
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content fingerprint over the normalized entries; stable across
    /// restarts for unchanged data. Cache keys hang off this.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Number of source rows skipped during load.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

struct CorpusBuilder {
    entries: Vec<Entry>,
    by_code: HashMap<String, usize>,
    total_rows: usize,
    skipped: usize,
}

impl CorpusBuilder {
    fn new() -> Self {
        Self { entries: Vec::new(), by_code: HashMap::new(), total_rows: 0, skipped: 0 }
    }

    fn read_rows(&mut self, reader: impl BufRead) -> Result<()> {
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            self.total_rows += 1;
            match parse_row(&line, lineno + 1) {
                Ok(entry) => {
                    if self.by_code.contains_key(&entry.code) {
                        warn!("line {}: duplicate code {}, row skipped", lineno + 1, entry.code);
                        self.skipped += 1;
                        continue;
                    }
                    self.by_code.insert(entry.code.clone(), self.entries.len());
                    self.entries.push(entry);
                }
                Err(e) => {
                    warn!("{e}, row skipped");
                    self.skipped += 1;
                }
            }
        }
        Ok(())
    }

    fn finish(self, config: &EngineConfig) -> Result<Corpus> {
        if self.entries.is_empty() {
            return Err(Error::CorpusIntegrity("no usable entries in source".to_string()));
        }
        let ratio = self.skipped as f32 / self.total_rows as f32;
        if ratio > config.max_skip_ratio {
            return Err(Error::CorpusIntegrity(format!(
                "{} of {} rows skipped ({:.1}% > {:.1}% allowed)",
                self.skipped,
                self.total_rows,
                ratio * 100.0,
                config.max_skip_ratio * 100.0
            )));
        }
        let fingerprint = fingerprint_entries(&self.entries);
        Ok(Corpus {
            entries: self.entries,
            by_code: self.by_code,
            fingerprint,
            skipped: self.skipped,
        })
    }
}

fn parse_row(line: &str, lineno: usize) -> Result<Entry> {
    let mut entry: Entry = serde_json::from_str(line)
        .map_err(|e| Error::Ingest(format!("line {lineno}: {e}")))?;
    entry.code = entry.code.trim().to_string();
    entry.description = entry.description.trim().to_string();
    if entry.code.is_empty() {
        return Err(Error::Ingest(format!("line {lineno}: missing code")));
    }
    if entry.description.is_empty() {
        return Err(Error::Ingest(format!("line {lineno}: empty description for {}", entry.code)));
    }
    Ok(entry)
}

/// Blake3 over the normalized serialized entries, in load order. Field
/// separators keep `("ab", "c")` and `("a", "bc")` distinct.
fn fingerprint_entries(entries: &[Entry]) -> String {
    let mut hasher = blake3::Hasher::new();
    for e in entries {
        hasher.update(e.code.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(e.description.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(e.category.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\x1f");
        hasher.update(e.unit.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\x1f");
        for f in &e.flags {
            hasher.update(f.as_bytes());
            hasher.update(b"\x1e");
        }
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

fn source_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("jsonl") {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
