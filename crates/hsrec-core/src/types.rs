//! Domain types shared by the lexical, semantic and hybrid crates.

use serde::{Deserialize, Serialize};

/// One entry of the reference taxonomy. Immutable after load.
///
/// `code` is the hierarchical identifier (e.g. `0101.21`), `description` the
/// official text the indices are built over. The structured attributes are
/// optional and pass through to results untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub flags: Vec<String>,
}

impl Entry {
    /// Chapter-level prefix of the code (first 2 digits).
    pub fn chapter(&self) -> &str {
        self.code_prefix(2)
    }

    /// Heading-level prefix of the code (first 4 digits).
    pub fn heading(&self) -> &str {
        self.code_prefix(4)
    }

    /// Shortest prefix of `code` containing `n` digits; the whole code if it
    /// has fewer.
    fn code_prefix(&self, n: usize) -> &str {
        let mut digits = 0;
        for (i, c) in self.code.char_indices() {
            if c.is_ascii_digit() {
                digits += 1;
                if digits == n {
                    return &self.code[..i + c.len_utf8()];
                }
            }
        }
        &self.code
    }
}

/// Which engine produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Lexical,
    Semantic,
}

/// Raw similarity hit from one signal. `entry` indexes into the corpus the
/// signal was built from; `score` is on the signal's native scale (lexical
/// [0,1], semantic [-1,1]) and must be normalized before blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalHit {
    pub entry: u32,
    pub score: f32,
}

/// Per-candidate score record. `lexical` and `semantic` are the min-max
/// normalized signal values over the query's candidate set (0.0 when the
/// entry was absent from that signal); `blended` is their weighted mix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub lexical: f32,
    pub semantic: f32,
    pub blended: f32,
}

/// One ranked recommendation. `rank` is 1-based. `annotation` is only ever
/// set by the augmentation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub code: String,
    pub description: String,
    pub rank: usize,
    pub scores: ScoreBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

/// Result of a `recommend` call. The flags mark degraded paths so callers
/// never mistake a fallback ranking for the full pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub candidates: Vec<Candidate>,
    /// False when the semantic signal was disabled or failed for this query.
    pub semantic_used: bool,
    /// Set by the augmentation stage on success, never from cache.
    pub augmented: bool,
    pub from_cache: bool,
}

impl Recommendation {
    pub fn empty() -> Self {
        Self { candidates: Vec::new(), semantic_used: false, augmented: false, from_cache: false }
    }
}

/// A free-text request. Ephemeral; `k` and `alpha` default from the engine
/// configuration when unset.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub text: String,
    pub k: Option<usize>,
    pub alpha: Option<f32>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), k: None, alpha: None }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = Some(alpha);
        self
    }
}
