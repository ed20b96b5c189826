//! Dense embedding index over entry descriptions.
//!
//! Embedding the corpus is the expensive part, so the built matrix is
//! persisted through the index cache keyed by corpus fingerprint and
//! embedder id, and rebuilt only when either changes. Rows are unit length,
//! so query scoring reduces to dot products.

pub mod provider;

use std::cmp::Ordering;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::info;

use hsrec_core::corpus::Corpus;
use hsrec_core::traits::{EmbedProvider, SimilaritySignal};
use hsrec_core::types::{SignalHit, SignalKind};
use hsrec_core::{Error, Result};

pub use provider::HashedEmbedder;

/// Bumped when the artifact layout changes; mismatched blobs are rebuilt.
pub const FORMAT_VERSION: u32 = 1;

/// Persisted form of the index: one unit-normalized row of `dim` floats per
/// corpus entry, in corpus order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticArtifact {
    pub version: u32,
    pub corpus_fingerprint: String,
    pub embedder_id: String,
    pub dim: usize,
    pub rows: usize,
    pub vectors: Vec<f32>,
}

impl SemanticArtifact {
    /// Whether a persisted artifact is usable for the live corpus and the
    /// injected provider.
    pub fn matches(&self, corpus_fingerprint: &str, embedder_id: &str) -> bool {
        self.version == FORMAT_VERSION
            && self.corpus_fingerprint == corpus_fingerprint
            && self.embedder_id == embedder_id
            && self.vectors.len() == self.rows * self.dim
    }
}

pub struct SemanticIndex {
    artifact: SemanticArtifact,
    provider: Arc<dyn EmbedProvider>,
}

impl SemanticIndex {
    /// Embed every entry description in batches and assemble the matrix.
    /// Fails atomically: any provider error aborts the build and nothing is
    /// exposed.
    pub fn build(
        corpus: &Corpus,
        provider: Arc<dyn EmbedProvider>,
        batch_size: usize,
    ) -> Result<Self> {
        let texts: Vec<String> = corpus.entries().iter().map(|e| e.description.clone()).collect();
        let dim = provider.dim();
        let mut vectors = Vec::with_capacity(texts.len() * dim);

        let pb = ProgressBar::new(texts.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} embeddings")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        for batch in texts.chunks(batch_size.max(1)) {
            let embedded = provider
                .embed_batch(batch)
                .map_err(|e| Error::Embedding(e.to_string()))?;
            if embedded.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            for v in embedded {
                if v.len() != dim {
                    return Err(Error::Embedding(format!(
                        "dimension mismatch: got {}, expected {dim}",
                        v.len()
                    )));
                }
                vectors.extend(l2_normalize(v));
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        info!(rows = texts.len(), dim, embedder = provider.embedder_id(), "semantic index built");

        Ok(Self {
            artifact: SemanticArtifact {
                version: FORMAT_VERSION,
                corpus_fingerprint: corpus.fingerprint().to_string(),
                embedder_id: provider.embedder_id().to_string(),
                dim,
                rows: texts.len(),
                vectors,
            },
            provider,
        })
    }

    /// Rehydrate from a persisted artifact. The caller is responsible for
    /// checking `SemanticArtifact::matches` against the live corpus first.
    pub fn from_artifact(artifact: SemanticArtifact, provider: Arc<dyn EmbedProvider>) -> Self {
        Self { artifact, provider }
    }

    pub fn artifact(&self) -> &SemanticArtifact {
        &self.artifact
    }

    pub fn embedder_id(&self) -> &str {
        &self.artifact.embedder_id
    }

    /// Cosine-score `query` against every entry, strongest first, at most
    /// `limit` hits. Ties break toward the lower corpus index for
    /// determinism. Provider failures surface as errors; the hybrid ranker
    /// degrades on them instead of propagating.
    pub fn score(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SignalHit>> {
        let mut embedded = self.provider.embed_batch(&[query.to_string()])?;
        if embedded.len() != 1 {
            anyhow::bail!("provider returned {} vectors for one query", embedded.len());
        }
        let q = embedded.remove(0);
        if q.len() != self.artifact.dim {
            anyhow::bail!("dimension mismatch: got {}, expected {}", q.len(), self.artifact.dim);
        }
        let q = l2_normalize(q);
        if q.iter().all(|x| *x == 0.0) {
            return Ok(Vec::new());
        }

        let dim = self.artifact.dim;
        let mut hits: Vec<SignalHit> = self
            .artifact
            .vectors
            .chunks(dim)
            .enumerate()
            .map(|(i, row)| SignalHit {
                entry: i as u32,
                score: row.iter().zip(&q).map(|(a, b)| a * b).sum(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.entry.cmp(&b.entry))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

impl SimilaritySignal for SemanticIndex {
    fn kind(&self) -> SignalKind {
        SignalKind::Semantic
    }

    fn score(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SignalHit>> {
        SemanticIndex::score(self, query, limit)
    }
}

/// Scale to unit length; the zero vector is left untouched.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-6 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
