//! Capability seams of the engine.
//!
//! The two built-in similarity strategies implement [`SimilaritySignal`]; the
//! external embedding and reasoning capabilities are injected behind
//! [`EmbedProvider`] and [`Augmenter`]. Capability failures are `anyhow`
//! errors: the ranker degrades on them instead of propagating.

use futures::future::BoxFuture;

use crate::types::{Candidate, SignalHit, SignalKind};

/// Embedding capability: `embed(text) -> vector<f32, D>`.
///
/// Implementations must be deterministic per `embedder_id` and return one
/// vector of exactly `dim()` floats per input text. Vectors are unit-
/// normalized again at index build time, so providers need not guarantee it.
pub trait EmbedProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hashed:xxh64:d256`).
    /// Part of the semantic index cache key.
    fn embedder_id(&self) -> &str;

    /// Embedding dimensionality D.
    fn dim(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A similarity signal scored against the built corpus.
///
/// `score` returns at most `limit` hits on the signal's native scale,
/// strongest first. An empty result is a valid "no match" outcome, not an
/// error.
pub trait SimilaritySignal: Send + Sync {
    fn kind(&self) -> SignalKind;

    fn score(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SignalHit>>;
}

/// External re-ranking capability over the top candidates.
///
/// Best-effort by contract: callers bound the future with a timeout and pass
/// the input ranking through unchanged on any failure.
pub trait Augmenter: Send + Sync {
    fn augmenter_id(&self) -> &str;

    fn augment<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [Candidate],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Candidate>>>;
}
