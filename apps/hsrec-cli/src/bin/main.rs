use std::sync::Arc;
use std::{env, path::PathBuf};

use hsrec_cache::CacheStore;
use hsrec_core::config::{expand_path, Config, EngineConfig};
use hsrec_core::corpus::Corpus;
use hsrec_core::traits::EmbedProvider;
use hsrec_core::types::{Query, Recommendation};
use hsrec_hybrid::Recommender;
use hsrec_semantic::HashedEmbedder;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <recommend|status|clear-cache> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let engine_config = EngineConfig::from_config(&config)?;
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "recommend" => {
            let query_text = args.iter().find(|a| !a.starts_with('-')).cloned().unwrap_or_else(|| {
                eprintln!("Usage: hsrec recommend \"<query>\" [-k N]");
                std::process::exit(1)
            });
            let k = flag_value(&args, "-k").and_then(|v| v.parse::<usize>().ok());

            let engine = open_engine(&config, engine_config)?;
            let mut query = Query::new(query_text.clone());
            query.k = k;
            let recommendation = engine.recommend(&query)?;
            print_recommendation(&query_text, &recommendation);
        }
        "status" => {
            let engine = open_engine(&config, engine_config)?;
            println!("{}", serde_json::to_string_pretty(&engine.status())?);
        }
        "clear-cache" => {
            let cache = CacheStore::open(&engine_config.cache_dir);
            let removed = cache.clear()?;
            println!("Removed {} cached blobs from {}", removed, engine_config.cache_dir.display());
        }
        _ => {
            eprintln!("Unknown command: {}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn open_engine(config: &Config, engine_config: EngineConfig) -> anyhow::Result<Recommender> {
    let corpus_path: String = config
        .get("data.corpus_path")
        .unwrap_or_else(|_| "./data/corpus.jsonl".to_string());
    let corpus = Corpus::load(&expand_path(corpus_path), &engine_config)?;
    let cache = CacheStore::open(&engine_config.cache_dir);
    Ok(Recommender::build(corpus, default_provider(), cache, engine_config)?)
}

fn default_provider() -> Option<Arc<dyn EmbedProvider>> {
    let disabled = std::env::var("APP_DISABLE_SEMANTIC")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if disabled {
        return None;
    }
    Some(Arc::new(HashedEmbedder::default()))
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
}

fn print_recommendation(query: &str, recommendation: &Recommendation) {
    println!("Results for '{}':", query);
    if recommendation.candidates.is_empty() {
        println!("  (no candidates)");
    }
    for c in &recommendation.candidates {
        println!(
            "  {:>2}. {:<12} blended={:.4} lex={:.4} sem={:.4}  {}",
            c.rank, c.code, c.scores.blended, c.scores.lexical, c.scores.semantic, c.description
        );
        if let Some(note) = &c.annotation {
            println!("      note: {}", note);
        }
    }
    let mut flags = Vec::new();
    if !recommendation.semantic_used {
        flags.push("semantic-disabled");
    }
    if !recommendation.augmented {
        flags.push("not-augmented");
    }
    if recommendation.from_cache {
        flags.push("cached");
    }
    if !flags.is_empty() {
        println!("  [{}]", flags.join(", "));
    }
}
