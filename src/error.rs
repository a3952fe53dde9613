use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CiteIdError {
    #[error("unknown identifier scheme: {0}")]
    UnknownScheme(String),

    #[error("invalid entity record: {0}")]
    InvalidRecord(String),

    #[error("missing config file citeid.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    #[error("cache snapshot error: {0}")]
    CacheFile(String),

    #[error("SQLite cache error: {0}")]
    CacheSql(String),

    #[error("remote cache error: {0}")]
    CacheRemote(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
