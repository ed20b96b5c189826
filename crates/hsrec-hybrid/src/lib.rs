//! Hybrid ranker: fans a query out to the lexical and semantic signals,
//! consults the query cache first, and merges the scores into one ranked
//! candidate list.
//!
//! The ranker owns the built indices and a cache handle with an explicit
//! lifecycle tied to corpus load, not ambient global state. Per-query
//! scoring is read-only, so one `Recommender` serves any number of
//! concurrent queries.

pub mod augment;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use hsrec_cache::keys::{cache_key, query_fingerprint};
use hsrec_cache::{CacheStats, CacheStore, CachedQueryResult};
use hsrec_core::config::EngineConfig;
use hsrec_core::corpus::Corpus;
use hsrec_core::traits::{EmbedProvider, SimilaritySignal};
use hsrec_core::types::{Candidate, Query, Recommendation, ScoreBreakdown, SignalHit};
use hsrec_core::{Error, Result};
use hsrec_lexical::{tokenize, LexicalIndex};
use hsrec_semantic::{SemanticArtifact, SemanticIndex};

/// Health/status snapshot for the transport boundary.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub entries: usize,
    pub skipped_rows: usize,
    pub corpus_fingerprint: String,
    pub lexical_vocab: usize,
    /// Embedder id when semantic scoring is available.
    pub embedder: Option<String>,
    pub cache: CacheStats,
}

pub struct Recommender {
    corpus: Corpus,
    lexical: LexicalIndex,
    semantic: Option<SemanticIndex>,
    cache: CacheStore,
    config: EngineConfig,
}

impl Recommender {
    /// Assemble the engine: load index artifacts from the cache when their
    /// fingerprints match the live corpus, build and persist them otherwise.
    /// Everything is built before the value exists: a failed build returns
    /// `Err` and no partially built index is ever observable. Passing no
    /// provider disables semantic scoring for the engine's lifetime.
    pub fn build(
        corpus: Corpus,
        provider: Option<Arc<dyn EmbedProvider>>,
        cache: CacheStore,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let fp = corpus.fingerprint().to_string();

        let lex_name = format!("lexical-{}", short_fp(&fp));
        let lexical = match cache.get_index::<LexicalIndex>(&lex_name) {
            Some(index) if index.matches(&fp, config.full_scan) => {
                debug!("lexical index loaded from cache");
                index
            }
            _ => {
                info!(entries = corpus.len(), "building lexical index");
                let index = LexicalIndex::build(&corpus, config.full_scan);
                if let Err(e) = cache.put_index(&lex_name, &index) {
                    warn!("lexical index cache write failed: {e}");
                }
                index
            }
        };

        let semantic = match provider {
            Some(provider) => {
                let name =
                    format!("semantic-{}-{}", short_fp(&fp), sanitize(provider.embedder_id()));
                let index = match cache.get_index::<SemanticArtifact>(&name) {
                    Some(artifact) if artifact.matches(&fp, provider.embedder_id()) => {
                        debug!("semantic index loaded from cache");
                        SemanticIndex::from_artifact(artifact, provider)
                    }
                    _ => {
                        info!(
                            entries = corpus.len(),
                            embedder = provider.embedder_id(),
                            "building semantic index"
                        );
                        let index =
                            SemanticIndex::build(&corpus, provider, config.embed_batch_size)?;
                        if let Err(e) = cache.put_index(&name, index.artifact()) {
                            warn!("semantic index cache write failed: {e}");
                        }
                        index
                    }
                };
                Some(index)
            }
            None => {
                info!("no embedding provider injected, semantic scoring disabled");
                None
            }
        };

        Ok(Self { corpus, lexical, semantic, cache, config })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            entries: self.corpus.len(),
            skipped_rows: self.corpus.skipped(),
            corpus_fingerprint: self.corpus.fingerprint().to_string(),
            lexical_vocab: self.lexical.vocab_size(),
            embedder: self.semantic.as_ref().map(|s| s.embedder_id().to_string()),
            cache: self.cache.stats(),
        }
    }

    /// Rank candidates for one query.
    ///
    /// Validation failures (`k == 0`, alpha out of range) are rejected before
    /// any work. An empty or all-stopword query yields an empty
    /// recommendation. Cache misses compute, write through and return; cache
    /// hits re-truncate the stored pooled list to `k`. Semantic failures
    /// degrade to lexical-only scoring with `semantic_used = false`.
    pub fn recommend(&self, query: &Query) -> Result<Recommendation> {
        let k = query.k.unwrap_or(self.config.top_k);
        if k == 0 {
            return Err(Error::InvalidQuery("k must be >= 1".to_string()));
        }
        let raw_tokens = query.text.split_whitespace().count();
        let alpha = self.config.effective_alpha(query.alpha, raw_tokens)?;

        if tokenize(&query.text).is_empty() {
            debug!("query has no scoreable tokens, returning empty result");
            return Ok(Recommendation::empty());
        }

        let corpus_fp = self.corpus.fingerprint();
        let config_fp = self.scoring_fingerprint(alpha);
        let key = cache_key(corpus_fp, &query_fingerprint(&query.text), &config_fp);

        if let Some(hit) = self.cache.get_query(&key, corpus_fp) {
            debug!(key = %key, "query cache hit");
            let mut candidates = hit.candidates;
            candidates.truncate(k);
            renumber(&mut candidates);
            return Ok(Recommendation {
                candidates,
                semantic_used: hit.semantic_used,
                augmented: false,
                from_cache: true,
            });
        }

        let lex_hits = self.run_signal(&self.lexical, &query.text).unwrap_or_default();
        let (sem_hits, semantic_used) = match &self.semantic {
            Some(index) => match self.run_signal(index, &query.text) {
                Some(hits) => (hits, true),
                None => (Vec::new(), false),
            },
            None => (Vec::new(), false),
        };

        // With no semantic signal the blend collapses to pure lexical.
        let effective_alpha = if semantic_used { alpha } else { 1.0 };
        let mut candidates = self.blend(&lex_hits, &sem_hits, effective_alpha);

        // A ranking degraded by a transient capability failure is not a pure
        // function of the cache key, so it is returned but never stored.
        let transiently_degraded = self.semantic.is_some() && !semantic_used;
        if transiently_degraded {
            warn!("skipping query cache write for degraded ranking");
        } else {
            let cached =
                CachedQueryResult::new(corpus_fp, config_fp, candidates.clone(), semantic_used);
            if let Err(e) = self.cache.put_query(&key, &cached) {
                warn!("query cache write failed: {e}");
            }
        }

        candidates.truncate(k);
        renumber(&mut candidates);
        Ok(Recommendation { candidates, semantic_used, augmented: false, from_cache: false })
    }

    /// Run one similarity strategy through the shared contract. A capability
    /// failure degrades to `None`; it never reaches the caller of
    /// `recommend`.
    fn run_signal(&self, signal: &dyn SimilaritySignal, query: &str) -> Option<Vec<SignalHit>> {
        match signal.score(query, self.config.candidate_pool) {
            Ok(hits) => Some(hits),
            Err(e) => {
                warn!("{:?} signal unavailable, degrading: {e}", signal.kind());
                None
            }
        }
    }

    /// Merge the two signals: min-max normalize each over its own candidate
    /// set, union by entry with 0.0 for the missing side, blend, sort by
    /// blended score descending with code ascending as the tie-break.
    fn blend(&self, lex: &[SignalHit], sem: &[SignalHit], alpha: f32) -> Vec<Candidate> {
        let lex_norm = min_max_normalize(lex);
        let sem_norm = min_max_normalize(sem);

        let mut union: BTreeMap<u32, ScoreBreakdown> = BTreeMap::new();
        for (entry, score) in lex_norm {
            union.entry(entry).or_default().lexical = score;
        }
        for (entry, score) in sem_norm {
            union.entry(entry).or_default().semantic = score;
        }

        let mut candidates: Vec<Candidate> = union
            .into_iter()
            .map(|(entry, mut scores)| {
                scores.blended = alpha * scores.lexical + (1.0 - alpha) * scores.semantic;
                let e = &self.corpus.entries()[entry as usize];
                Candidate {
                    code: e.code.clone(),
                    description: e.description.clone(),
                    rank: 0,
                    scores,
                    annotation: None,
                }
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.scores
                .blended
                .partial_cmp(&a.scores.blended)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.code.cmp(&b.code))
        });
        candidates.truncate(self.config.candidate_pool);
        renumber(&mut candidates);
        candidates
    }

    /// Fingerprint of everything configuration-side that shapes a ranking.
    /// `k` is deliberately absent: cached lists are re-truncated per request.
    fn scoring_fingerprint(&self, alpha: f32) -> String {
        let embedder = self.semantic.as_ref().map(|s| s.embedder_id()).unwrap_or("none");
        let input = format!(
            "v1|alpha={:.4}|pool={}|full_scan={}|embedder={}",
            alpha, self.config.candidate_pool, self.config.full_scan, embedder
        );
        blake3::hash(input.as_bytes()).to_hex().to_string()
    }
}

/// Map each hit's score into [0, 1] by min-max over the hit set itself (not
/// the whole corpus). A degenerate set where every score is equal maps to
/// 1.0 when that score is positive and 0.0 otherwise.
fn min_max_normalize(hits: &[SignalHit]) -> Vec<(u32, f32)> {
    if hits.is_empty() {
        return Vec::new();
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for h in hits {
        min = min.min(h.score);
        max = max.max(h.score);
    }
    let span = max - min;
    hits.iter()
        .map(|h| {
            let score = if span > 0.0 {
                (h.score - min) / span
            } else if max > 0.0 {
                1.0
            } else {
                0.0
            };
            (h.entry, score)
        })
        .collect()
}

fn renumber(candidates: &mut [Candidate]) {
    for (i, c) in candidates.iter_mut().enumerate() {
        c.rank = i + 1;
    }
}

fn short_fp(fp: &str) -> &str {
    &fp[..fp.len().min(8)]
}

fn sanitize(id: &str) -> String {
    id.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '-' }).collect()
}

#[cfg(test)]
mod tests {
    use super::min_max_normalize;
    use hsrec_core::types::SignalHit;

    #[test]
    fn min_max_spreads_scores_over_unit_range() {
        let hits = vec![
            SignalHit { entry: 0, score: 0.2 },
            SignalHit { entry: 1, score: 0.6 },
            SignalHit { entry: 2, score: 1.0 },
        ];
        let normalized = min_max_normalize(&hits);
        assert_eq!(normalized[0].1, 0.0);
        assert!((normalized[1].1 - 0.5).abs() < 1e-6);
        assert_eq!(normalized[2].1, 1.0);
    }

    #[test]
    fn degenerate_sets_collapse_predictably() {
        let equal = vec![SignalHit { entry: 0, score: 0.4 }, SignalHit { entry: 1, score: 0.4 }];
        assert!(min_max_normalize(&equal).iter().all(|(_, s)| *s == 1.0));

        let zeros = vec![SignalHit { entry: 0, score: 0.0 }];
        assert!(min_max_normalize(&zeros).iter().all(|(_, s)| *s == 0.0));

        assert!(min_max_normalize(&[]).is_empty());
    }
}
