//! Configuration loading and the typed engine settings.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env
//! vars, and provides helpers to expand `~` and `${VAR}` in user-supplied
//! paths.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }
}

/// How the lexical/semantic blend weight is chosen when a query carries no
/// explicit override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    /// Always use `EngineConfig::alpha`.
    Fixed,
    /// Pick by query length: short queries lean on exact terms, longer
    /// free-text leans on meaning, very long listings swing back to terms.
    Adaptive,
}

/// Tunable engine settings. All ranking-relevant fields participate in the
/// query-cache configuration fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lexical weight in `alpha * lexical + (1 - alpha) * semantic`.
    /// 0.5 balances the two signals; forced to 1.0 while semantic scoring is
    /// unavailable.
    pub alpha: f32,
    /// Default number of results when a query does not ask for a count.
    pub top_k: usize,
    /// Per-signal candidate cut before blending, and the length of the
    /// ranked list written through to the query cache.
    pub candidate_pool: usize,
    pub weight_mode: WeightMode,
    /// When true the lexical signal scores every entry instead of only those
    /// sharing a query term. Entries without overlap score 0.
    pub full_scan: bool,
    /// Maximum tolerated fraction of skipped source rows before a load fails
    /// with `CorpusIntegrity`.
    pub max_skip_ratio: f32,
    pub cache_dir: PathBuf,
    /// Upper bound on the augmentation capability call.
    pub augment_timeout_secs: u64,
    /// Batch size for embedding the corpus at semantic index build.
    pub embed_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            top_k: 30,
            candidate_pool: 100,
            weight_mode: WeightMode::Fixed,
            full_scan: false,
            max_skip_ratio: 0.05,
            cache_dir: PathBuf::from("./cache"),
            augment_timeout_secs: 30,
            embed_batch_size: 32,
        }
    }
}

impl EngineConfig {
    /// Extract the `[engine]` section, falling back to defaults when absent.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cfg: EngineConfig = config.get("engine").unwrap_or_default();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidConfig(format!(
                "alpha must be in [0, 1], got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.max_skip_ratio) {
            return Err(Error::InvalidConfig(format!(
                "max_skip_ratio must be in [0, 1], got {}",
                self.max_skip_ratio
            )));
        }
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be >= 1".to_string()));
        }
        if self.candidate_pool == 0 {
            return Err(Error::InvalidConfig("candidate_pool must be >= 1".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(Error::InvalidConfig("embed_batch_size must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Blend weight for one request: explicit override > weight mode.
    /// `token_count` is the whitespace token count of the raw query text.
    pub fn effective_alpha(&self, override_alpha: Option<f32>, token_count: usize) -> Result<f32> {
        let alpha = match override_alpha {
            Some(a) => {
                if !(0.0..=1.0).contains(&a) {
                    return Err(Error::InvalidConfig(format!(
                        "alpha override must be in [0, 1], got {a}"
                    )));
                }
                a
            }
            None => match self.weight_mode {
                WeightMode::Fixed => self.alpha,
                WeightMode::Adaptive => adaptive_alpha(token_count),
            },
        };
        Ok(alpha)
    }
}

fn adaptive_alpha(tokens: usize) -> f32 {
    match tokens {
        0..=2 => 0.7,
        3..=4 => 0.5,
        5..=7 => 0.4,
        _ => 0.6,
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after
/// expansion. Absolute paths are returned as-is.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}
