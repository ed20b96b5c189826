//! Built-in embedding providers.
//!
//! Real model backends (local transformer, remote API) are injected by the
//! host process through the `EmbedProvider` trait; this module only ships
//! the deterministic hashed provider used for offline runs and tests.

use std::hash::Hasher;

use twox_hash::XxHash64;

use hsrec_core::traits::EmbedProvider;

/// Deterministic hash-bucket embedder: each casefolded whitespace token is
/// bucketed by xxhash into one of `dim` slots, with a small positional
/// wobble, and the vector L2-normalized. Not a learned model, it only
/// preserves token-overlap structure, but it is stable across processes,
/// which is what the index cache and the test suite need.
pub struct HashedEmbedder {
    dim: usize,
    id: String,
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hashed:xxh64:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbedProvider for HashedEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
