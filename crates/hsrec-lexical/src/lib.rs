//! Sparse tf-idf index over entry descriptions.
//!
//! Build is a one-time pass producing a fixed vocabulary, per-term document
//! frequencies and L2-normalized document vectors stored as inverted
//! postings; query scoring walks only the postings of the query's known
//! terms, so it touches the entries sharing at least one term rather than
//! the whole corpus.

pub mod index;
pub mod tokenize;

pub use index::LexicalIndex;
pub use tokenize::tokenize;
