use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use hsrec_core::corpus::Corpus;
use hsrec_core::traits::SimilaritySignal;
use hsrec_core::types::{SignalHit, SignalKind};

use crate::tokenize::tokenize;

/// Bumped whenever the tokenizer or weighting scheme changes, so persisted
/// artifacts from older builds are rebuilt instead of reused.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Posting {
    entry: u32,
    /// tf-idf weight of this term in the entry, post L2 normalization.
    weight: f32,
}

/// Term-frequency x inverse-document-frequency vector space over entry
/// descriptions. Sublinear tf (`1 + ln tf`) and smoothed idf
/// (`ln((1+N)/(1+df)) + 1`); document vectors are unit length, so query
/// scoring is a cosine in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalIndex {
    version: u32,
    corpus_fingerprint: String,
    full_scan: bool,
    vocab: HashMap<String, u32>,
    idf: Vec<f32>,
    postings: Vec<Vec<Posting>>,
    codes: Vec<String>,
    desc_chars: Vec<u32>,
}

impl LexicalIndex {
    pub fn build(corpus: &Corpus, full_scan: bool) -> Self {
        let n = corpus.len();
        let docs: Vec<Vec<String>> = corpus
            .entries()
            .iter()
            .map(|e| tokenize(&e.description))
            .collect();

        // Document frequencies, then term ids in sorted order so the built
        // artifact is byte-stable for a given corpus.
        let mut df: HashMap<&str, u32> = HashMap::new();
        for tokens in &docs {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for t in unique {
                *df.entry(t).or_insert(0) += 1;
            }
        }
        let mut terms: Vec<&str> = df.keys().copied().collect();
        terms.sort_unstable();

        let mut vocab = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (id, term) in terms.iter().enumerate() {
            vocab.insert((*term).to_string(), id as u32);
            let d = df[*term] as f32;
            idf.push(((1.0 + n as f32) / (1.0 + d)).ln() + 1.0);
        }

        let mut postings: Vec<Vec<Posting>> = vec![Vec::new(); terms.len()];
        for (doc_idx, tokens) in docs.iter().enumerate() {
            let mut counts: HashMap<u32, u32> = HashMap::new();
            for t in tokens {
                if let Some(&id) = vocab.get(t) {
                    *counts.entry(id).or_insert(0) += 1;
                }
            }
            let mut weights: Vec<(u32, f32)> = counts
                .into_iter()
                .map(|(id, c)| (id, (1.0 + (c as f32).ln()) * idf[id as usize]))
                .collect();
            // Fixed summation order: float addition is not associative, and
            // scores must be bit-identical across rebuilds and restarts.
            weights.sort_unstable_by_key(|(id, _)| *id);
            let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
            if norm > 0.0 {
                for (_, w) in &mut weights {
                    *w /= norm;
                }
            }
            for (id, w) in weights {
                postings[id as usize].push(Posting { entry: doc_idx as u32, weight: w });
            }
        }

        let codes = corpus.entries().iter().map(|e| e.code.clone()).collect();
        let desc_chars = corpus
            .entries()
            .iter()
            .map(|e| e.description.chars().count() as u32)
            .collect();

        Self {
            version: FORMAT_VERSION,
            corpus_fingerprint: corpus.fingerprint().to_string(),
            full_scan,
            vocab,
            idf,
            postings,
            codes,
            desc_chars,
        }
    }

    /// Whether a persisted artifact is usable for the live corpus and
    /// configured pruning strategy.
    pub fn matches(&self, corpus_fingerprint: &str, full_scan: bool) -> bool {
        self.version == FORMAT_VERSION
            && self.corpus_fingerprint == corpus_fingerprint
            && self.full_scan == full_scan
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Cosine-score `query` against the corpus, strongest first, at most
    /// `limit` hits. Unknown terms contribute zero weight; an empty or
    /// all-stopword query returns no hits.
    ///
    /// Ties break toward the shorter description (the more specific entry),
    /// then code ascending.
    pub fn score(&self, query: &str, limit: usize) -> Vec<SignalHit> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut counts: HashMap<u32, u32> = HashMap::new();
        for t in &tokens {
            if let Some(&id) = self.vocab.get(t) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }

        let mut qweights: Vec<(u32, f32)> = counts
            .into_iter()
            .map(|(id, c)| (id, (1.0 + (c as f32).ln()) * self.idf[id as usize]))
            .collect();
        // Same fixed order as the build pass, for run-to-run determinism.
        qweights.sort_unstable_by_key(|(id, _)| *id);
        let norm = qweights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut qweights {
                *w /= norm;
            }
        }

        let mut acc: HashMap<u32, f32> = HashMap::new();
        for (id, qw) in &qweights {
            for p in &self.postings[*id as usize] {
                *acc.entry(p.entry).or_insert(0.0) += qw * p.weight;
            }
        }

        let mut hits: Vec<SignalHit> = if self.full_scan {
            (0..self.codes.len() as u32)
                .map(|entry| SignalHit { entry, score: acc.get(&entry).copied().unwrap_or(0.0) })
                .collect()
        } else {
            acc.into_iter()
                .map(|(entry, score)| SignalHit { entry, score })
                .collect()
        };

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    self.desc_chars[a.entry as usize].cmp(&self.desc_chars[b.entry as usize])
                })
                .then_with(|| self.codes[a.entry as usize].cmp(&self.codes[b.entry as usize]))
        });
        hits.truncate(limit);
        hits
    }
}

impl SimilaritySignal for LexicalIndex {
    fn kind(&self) -> SignalKind {
        SignalKind::Lexical
    }

    fn score(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SignalHit>> {
        Ok(LexicalIndex::score(self, query, limit))
    }
}
