use std::sync::Arc;
use std::{env, path::PathBuf};

use hsrec_cache::CacheStore;
use hsrec_core::config::{expand_path, Config, EngineConfig};
use hsrec_core::corpus::Corpus;
use hsrec_core::traits::EmbedProvider;
use hsrec_hybrid::Recommender;
use hsrec_semantic::HashedEmbedder;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let engine_config = EngineConfig::from_config(&config)?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut corpus_path = None;
    let mut rebuild = false;
    for arg in &args {
        match arg.as_str() {
            "--rebuild" | "-r" => rebuild = true,
            _ if !arg.starts_with('-') => corpus_path = Some(PathBuf::from(arg)),
            _ => {}
        }
    }
    let corpus_path = corpus_path.unwrap_or_else(|| {
        let p: String = config
            .get("data.corpus_path")
            .unwrap_or_else(|_| "./data/corpus.jsonl".to_string());
        expand_path(p)
    });

    println!("hsrec indexer");
    println!("=============");
    println!("Corpus source: {}", corpus_path.display());
    println!("Cache dir:     {}", engine_config.cache_dir.display());

    let cache = CacheStore::open(&engine_config.cache_dir);
    if rebuild {
        let removed = cache.clear()?;
        println!("Cleared {} cached blobs (--rebuild)", removed);
    }

    let corpus = Corpus::load(&corpus_path, &engine_config)?;
    println!(
        "Loaded {} entries ({} rows skipped), fingerprint {}",
        corpus.len(),
        corpus.skipped(),
        &corpus.fingerprint()[..12]
    );

    let engine = Recommender::build(corpus, default_provider(), cache, engine_config)?;
    let status = engine.status();
    println!("Lexical vocabulary: {} terms", status.lexical_vocab);
    match &status.embedder {
        Some(id) => println!("Semantic index:     {}", id),
        None => println!("Semantic index:     disabled"),
    }
    println!("Cache:              {} blobs, {} bytes", status.cache.index_blobs, status.cache.total_bytes);
    println!("\nIndexing completed. Query with: cargo run --bin hsrec recommend \"<query>\"");
    Ok(())
}

/// The hashed provider keeps everything offline; set APP_DISABLE_SEMANTIC=1
/// to run lexical-only. Model-backed providers are wired in by the host
/// process, not this binary.
fn default_provider() -> Option<Arc<dyn EmbedProvider>> {
    let disabled = std::env::var("APP_DISABLE_SEMANTIC")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if disabled {
        return None;
    }
    Some(Arc::new(HashedEmbedder::default()))
}
