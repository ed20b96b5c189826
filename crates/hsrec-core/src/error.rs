use thiserror::Error;

/// Engine error taxonomy.
///
/// Load-time failures (`CorpusIntegrity`, `Embedding`, `Io`) are fatal and
/// surfaced to the operator. Per-query failures are either input validation
/// (`InvalidQuery`, `InvalidConfig`), rejected before any work, or handled by
/// the caller as degradation (`CacheWrite` is logged and swallowed; capability
/// failures never reach `recommend` callers at all).
#[derive(Debug, Error)]
pub enum Error {
    /// A single malformed source row. Recoverable: the loader skips and
    /// counts these.
    #[error("bad source row: {0}")]
    Ingest(String),

    /// Too much bad data at load time, or an unusable source.
    #[error("corpus integrity: {0}")]
    CorpusIntegrity(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Irrecoverable storage fault while persisting a cache blob.
    #[error("cache write failed: {0}")]
    CacheWrite(String),

    /// Embedding provider failure during index build.
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
