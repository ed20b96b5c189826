use std::sync::Arc;

use tempfile::TempDir;

use hsrec_cache::CacheStore;
use hsrec_core::config::EngineConfig;
use hsrec_core::corpus::Corpus;
use hsrec_core::types::Query;
use hsrec_core::Error;
use hsrec_hybrid::Recommender;
use hsrec_semantic::HashedEmbedder;

fn corpus(rows: &[(&str, &str)]) -> Corpus {
    let jsonl: Vec<u8> = rows
        .iter()
        .map(|(code, desc)| format!(r#"{{"code": "{code}", "description": "{desc}"}}"#))
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes();
    Corpus::from_reader(&jsonl[..], &EngineConfig::default()).expect("corpus")
}

fn horses() -> Corpus {
    corpus(&[
        ("0101.21", "Live horses, purebred breeding animals"),
        ("0101.29", "Live horses, other"),
    ])
}

fn engine(corpus: Corpus, semantic: bool, cache_dir: &TempDir) -> Recommender {
    let mut config = EngineConfig::default();
    config.cache_dir = cache_dir.path().to_path_buf();
    let provider: Option<Arc<dyn hsrec_core::traits::EmbedProvider>> = if semantic {
        Some(Arc::new(HashedEmbedder::default()))
    } else {
        None
    };
    Recommender::build(corpus, provider, CacheStore::open(cache_dir.path()), config)
        .expect("engine")
}

#[test]
fn lexical_only_breeding_query_ranks_the_breeding_entry_first() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), false, &tmp);

    let rec = engine.recommend(&Query::new("horse for breeding")).expect("recommend");
    assert!(!rec.candidates.is_empty());
    assert_eq!(rec.candidates[0].code, "0101.21");
    if let Some(other) = rec.candidates.iter().find(|c| c.code == "0101.29") {
        assert!(other.rank > rec.candidates[0].rank);
    }
    assert!(!rec.semantic_used);
    assert!(!rec.augmented);
}

#[test]
fn results_are_bounded_by_k_and_never_padded() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    let rec = engine.recommend(&Query::new("live horses").with_k(3)).expect("recommend");
    assert_eq!(rec.candidates.len(), 2, "two entries exist, no padding to k=3");

    let rec = engine.recommend(&Query::new("live horses").with_k(1)).expect("recommend");
    assert_eq!(rec.candidates.len(), 1);
}

#[test]
fn k_zero_is_rejected_before_any_work() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    match engine.recommend(&Query::new("live horses").with_k(0)) {
        Err(Error::InvalidQuery(_)) => {}
        other => panic!("expected InvalidQuery, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn out_of_range_alpha_override_is_rejected() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    match engine.recommend(&Query::new("live horses").with_alpha(1.5)) {
        Err(Error::InvalidConfig(_)) => {}
        other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn empty_and_stopword_queries_return_empty_results() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    assert!(engine.recommend(&Query::new("")).expect("empty").candidates.is_empty());
    assert!(engine.recommend(&Query::new("of the and")).expect("stopwords").candidates.is_empty());
}

#[test]
fn ranking_is_strictly_ordered_and_deterministic() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(
        corpus(&[
            ("0101.21", "Live horses, purebred breeding animals"),
            ("0101.29", "Live horses, other"),
            ("0102.21", "Live cattle, purebred breeding animals"),
            ("0103.10", "Live swine, purebred breeding animals"),
        ]),
        true,
        &tmp,
    );

    let query = Query::new("purebred breeding animals");
    let first = engine.recommend(&query).expect("first");
    let second = engine.recommend(&query).expect("second");

    assert_eq!(first.candidates, second.candidates, "same cache state, same output");
    for (i, c) in first.candidates.iter().enumerate() {
        assert_eq!(c.rank, i + 1, "ranks are 1-based and dense");
    }
    for pair in first.candidates.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.scores.blended > b.scores.blended
                || (a.scores.blended == b.scores.blended && a.code < b.code),
            "descending blended score with code tie-break"
        );
    }
}

#[test]
fn second_call_is_served_from_cache_with_identical_candidates() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    let query = Query::new("live horses");
    let first = engine.recommend(&query).expect("first");
    assert!(!first.from_cache);
    let second = engine.recommend(&query).expect("second");
    assert!(second.from_cache);
    assert_eq!(first.candidates, second.candidates);
    assert_eq!(first.semantic_used, second.semantic_used);
}

#[test]
fn cache_hit_retruncates_to_the_requested_k() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    let full = engine.recommend(&Query::new("live horses").with_k(2)).expect("full");
    assert_eq!(full.candidates.len(), 2);

    let narrowed = engine.recommend(&Query::new("live horses").with_k(1)).expect("narrowed");
    assert!(narrowed.from_cache, "same token set and config share the entry");
    assert_eq!(narrowed.candidates.len(), 1);
    assert_eq!(narrowed.candidates[0].code, full.candidates[0].code);
    assert_eq!(narrowed.candidates[0].rank, 1);
}

#[test]
fn token_order_insensitive_queries_share_a_cache_entry() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), false, &tmp);

    let first = engine.recommend(&Query::new("live horses")).expect("first");
    assert!(!first.from_cache);
    let reordered = engine.recommend(&Query::new("Horses  LIVE")).expect("reordered");
    assert!(reordered.from_cache, "case, order and spacing fold into one fingerprint");
    assert_eq!(first.candidates, reordered.candidates);
}

#[test]
fn corpus_change_invalidates_cached_rankings() {
    let tmp = TempDir::new().expect("tempdir");

    let engine_a = engine(horses(), false, &tmp);
    let first = engine_a.recommend(&Query::new("live horses")).expect("first");
    assert!(!first.from_cache);

    // Same cache directory, different corpus content.
    let engine_b = engine(
        corpus(&[
            ("0101.21", "Live horses, purebred breeding animals"),
            ("0101.29", "Live horses, other"),
            ("0101.30", "Live asses"),
        ]),
        false,
        &tmp,
    );
    let after = engine_b.recommend(&Query::new("live horses")).expect("after");
    assert!(!after.from_cache, "stale entries are not reused across fingerprints");
}

#[test]
fn engine_works_with_the_cache_entirely_absent() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    let before = engine.recommend(&Query::new("live horses")).expect("before");
    std::fs::remove_dir_all(tmp.path().join("queries")).ok();
    std::fs::remove_dir_all(tmp.path().join("index")).ok();

    let after = engine.recommend(&Query::new("live horses")).expect("after");
    assert!(!after.from_cache);
    assert_eq!(before.candidates, after.candidates, "cache is an optimization, not correctness");
}

#[test]
fn semantic_disabled_equals_pure_lexical_scoring() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), false, &tmp);

    let rec = engine.recommend(&Query::new("purebred breeding horses")).expect("recommend");
    assert!(!rec.semantic_used);
    for c in &rec.candidates {
        assert_eq!(c.scores.semantic, 0.0);
        assert_eq!(c.scores.blended, c.scores.lexical, "alpha is forced to 1");
    }
}

#[test]
fn alpha_extremes_reduce_to_single_signals() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    let lexical_only = engine
        .recommend(&Query::new("purebred breeding").with_alpha(1.0))
        .expect("alpha=1");
    for c in &lexical_only.candidates {
        assert_eq!(c.scores.blended, c.scores.lexical);
    }

    let semantic_only = engine
        .recommend(&Query::new("purebred breeding").with_alpha(0.0))
        .expect("alpha=0");
    for c in &semantic_only.candidates {
        assert_eq!(c.scores.blended, c.scores.semantic);
    }
}

#[test]
fn distinct_alphas_use_distinct_cache_entries() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    let a = engine.recommend(&Query::new("live horses").with_alpha(0.9)).expect("a");
    assert!(!a.from_cache);
    let b = engine.recommend(&Query::new("live horses").with_alpha(0.1)).expect("b");
    assert!(!b.from_cache, "a different blend weight is a different configuration");
}

#[test]
fn index_artifacts_are_reused_across_engine_restarts() {
    let tmp = TempDir::new().expect("tempdir");

    let first = engine(horses(), true, &tmp);
    let before = first.recommend(&Query::new("breeding horses")).expect("before");
    drop(first);

    let second = engine(horses(), true, &tmp);
    let status = second.status();
    assert!(status.cache.index_blobs >= 2, "lexical and semantic artifacts persisted");
    let after = second.recommend(&Query::new("breeding horses")).expect("after");
    assert_eq!(before.candidates, after.candidates, "restart reproduces identical scores");
}

#[test]
fn status_reports_the_engine_shape() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), true, &tmp);

    let status = engine.status();
    assert_eq!(status.entries, 2);
    assert_eq!(status.skipped_rows, 0);
    assert!(!status.corpus_fingerprint.is_empty());
    assert!(status.lexical_vocab > 0);
    assert_eq!(status.embedder.as_deref(), Some("hashed:xxh64:d256"));
}

#[test]
fn lookup_is_exposed_through_the_corpus() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(horses(), false, &tmp);

    assert!(engine.corpus().lookup("0101.21").is_ok());
    assert!(matches!(engine.corpus().lookup("nope"), Err(Error::NotFound(_))));
}
