//! Cache key derivation.

/// Canonical fingerprint of a free-text query: casefolded, whitespace-split,
/// sorted, deduplicated token set. Token order, repeats, case and spacing
/// are deliberately ignored so equivalent queries share one cache entry.
pub fn query_fingerprint(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.dedup();
    blake3::hash(tokens.join(" ").as_bytes()).to_hex().to_string()
}

/// Key of one query-cache entry. Any change to corpus content, query token
/// set or ranking configuration lands on a different key.
pub fn cache_key(corpus_fp: &str, query_fp: &str, config_fp: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(corpus_fp.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(query_fp.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(config_fp.as_bytes());
    hasher.finalize().to_hex().to_string()
}
