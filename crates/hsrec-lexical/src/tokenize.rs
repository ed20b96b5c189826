//! Shared tokenizer for entry descriptions and query text.

/// Dropped from both documents and queries. Small on purpose: taxonomy
/// descriptions are terse noun phrases, not prose.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with",
];

/// Casefold, split on non-alphanumeric runs, drop single characters and
/// stopwords. An empty result is the "no lexical content" signal.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}
