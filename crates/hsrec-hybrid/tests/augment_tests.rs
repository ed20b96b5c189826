use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tempfile::TempDir;

use hsrec_cache::CacheStore;
use hsrec_core::config::EngineConfig;
use hsrec_core::corpus::Corpus;
use hsrec_core::traits::Augmenter;
use hsrec_core::types::{Candidate, Query};
use hsrec_hybrid::augment::AugmentStage;
use hsrec_hybrid::Recommender;
use hsrec_semantic::HashedEmbedder;

fn engine(cache_dir: &TempDir) -> Recommender {
    let jsonl: &[u8] = br#"{"code": "0101.21", "description": "Live horses, purebred breeding animals"}
{"code": "0101.29", "description": "Live horses, other"}
{"code": "0102.21", "description": "Live cattle, purebred breeding animals"}"#;
    let mut config = EngineConfig::default();
    config.cache_dir = cache_dir.path().to_path_buf();
    let corpus = Corpus::from_reader(jsonl, &EngineConfig::default()).expect("corpus");
    Recommender::build(
        corpus,
        Some(Arc::new(HashedEmbedder::default())),
        CacheStore::open(cache_dir.path()),
        config,
    )
    .expect("engine")
}

/// Reverses the ranking and tags every candidate, standing in for an
/// external reasoning model.
struct ReversingAugmenter;

impl Augmenter for ReversingAugmenter {
    fn augmenter_id(&self) -> &str {
        "test:reverse"
    }
    fn augment<'a>(
        &'a self,
        _query: &'a str,
        candidates: &'a [Candidate],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Candidate>>> {
        async move {
            let mut reordered: Vec<Candidate> = candidates.to_vec();
            reordered.reverse();
            for c in &mut reordered {
                c.annotation = Some(format!("reviewed {}", c.code));
            }
            Ok(reordered)
        }
        .boxed()
    }
}

struct SlowAugmenter;

impl Augmenter for SlowAugmenter {
    fn augmenter_id(&self) -> &str {
        "test:slow"
    }
    fn augment<'a>(
        &'a self,
        _query: &'a str,
        candidates: &'a [Candidate],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Candidate>>> {
        async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok(candidates.to_vec())
        }
        .boxed()
    }
}

struct FailingAugmenter;

impl Augmenter for FailingAugmenter {
    fn augmenter_id(&self) -> &str {
        "test:failing"
    }
    fn augment<'a>(
        &'a self,
        _query: &'a str,
        _candidates: &'a [Candidate],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Candidate>>> {
        async move { anyhow::bail!("quota exhausted") }.boxed()
    }
}

#[tokio::test]
async fn successful_augmentation_reorders_and_annotates() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(&tmp);
    let stage = AugmentStage::new(Box::new(ReversingAugmenter), Duration::from_secs(5));

    let plain = engine.recommend(&Query::new("purebred breeding")).expect("recommend");
    let original_codes: Vec<String> = plain.candidates.iter().map(|c| c.code.clone()).collect();

    let augmented = stage.apply("purebred breeding", plain).await;
    assert!(augmented.augmented);
    let augmented_codes: Vec<String> =
        augmented.candidates.iter().map(|c| c.code.clone()).collect();
    let mut reversed = original_codes.clone();
    reversed.reverse();
    assert_eq!(augmented_codes, reversed);
    for (i, c) in augmented.candidates.iter().enumerate() {
        assert_eq!(c.rank, i + 1, "ranks are renumbered after reordering");
        assert_eq!(c.annotation.as_deref(), Some(format!("reviewed {}", c.code).as_str()));
    }
}

#[tokio::test]
async fn timeout_passes_the_ranking_through_unchanged() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(&tmp);
    let stage = AugmentStage::new(Box::new(SlowAugmenter), Duration::from_millis(20));

    let plain = engine.recommend(&Query::new("purebred breeding")).expect("recommend");
    let expected = plain.candidates.clone();

    let result = stage.apply("purebred breeding", plain).await;
    assert!(!result.augmented, "timed-out augmentation is flagged as not augmented");
    assert_eq!(result.candidates, expected);
}

#[tokio::test]
async fn capability_failure_passes_the_ranking_through_unchanged() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(&tmp);
    let stage = AugmentStage::new(Box::new(FailingAugmenter), Duration::from_secs(5));

    let plain = engine.recommend(&Query::new("purebred breeding")).expect("recommend");
    let expected = plain.candidates.clone();

    let result = stage.apply("purebred breeding", plain).await;
    assert!(!result.augmented);
    assert_eq!(result.candidates, expected);
}

#[tokio::test]
async fn augmentation_never_reaches_the_query_cache() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(&tmp);
    let stage = AugmentStage::new(Box::new(ReversingAugmenter), Duration::from_secs(5));

    let first = engine.recommend(&Query::new("purebred breeding")).expect("first");
    let original: Vec<String> = first.candidates.iter().map(|c| c.code.clone()).collect();
    let augmented = stage.apply("purebred breeding", first).await;
    assert!(augmented.augmented);

    let again = engine.recommend(&Query::new("purebred breeding")).expect("again");
    assert!(again.from_cache);
    assert!(!again.augmented);
    let cached: Vec<String> = again.candidates.iter().map(|c| c.code.clone()).collect();
    assert_eq!(cached, original, "the cached deterministic ranking is untouched");
}

#[tokio::test]
async fn empty_recommendations_skip_the_capability() {
    let tmp = TempDir::new().expect("tempdir");
    let engine = engine(&tmp);
    let stage = AugmentStage::new(Box::new(FailingAugmenter), Duration::from_secs(5));

    let empty = engine.recommend(&Query::new("")).expect("empty");
    let result = stage.apply("", empty).await;
    assert!(result.candidates.is_empty());
    assert!(!result.augmented);
}
