//! Validation cache backends.
//!
//! Every backend stores the same thing: for each normalised, prefixed
//! identifier an optional validity flag plus a metadata map. Records only ever
//! grow. [`ValidationCache::set`] overwrites the flag; [`ValidationCache::set_full`]
//! fills in what is still missing and leaves existing values alone.

use std::collections::BTreeSet;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CiteIdError;
use crate::schemes::Metadata;

pub mod memory;
pub mod remote;
pub mod sqlite;

pub use memory::MemoryCache;
pub use remote::RedisCache;
pub use sqlite::SqliteCache;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl ValidationRecord {
    pub fn new(valid: bool, metadata: Metadata) -> Self {
        Self {
            valid: Some(valid),
            metadata,
        }
    }

    /// Copies over the flag and metadata keys this record does not have yet.
    pub fn merge_missing(&mut self, other: &ValidationRecord) {
        if self.valid.is_none() {
            self.valid = other.valid;
        }
        for (key, value) in &other.metadata {
            if key == "valid" {
                continue;
            }
            self.metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

pub trait ValidationCache: Send + Sync {
    /// Cached decision for `id`, `None` when it was never decided.
    fn get(&self, id: &str) -> Result<Option<bool>, CiteIdError>;

    fn set(&self, id: &str, valid: bool) -> Result<(), CiteIdError>;

    fn set_full(&self, id: &str, record: &ValidationRecord) -> Result<(), CiteIdError>;

    fn metadata(&self, id: &str) -> Result<Metadata, CiteIdError>;

    fn delete_all(&self) -> Result<(), CiteIdError>;

    /// Identifiers with any stored record, decoded.
    fn list_keys(&self) -> Result<BTreeSet<String>, CiteIdError>;

    fn persist(&self) -> Result<(), CiteIdError>;
}

/// Storage form of an identifier key.
pub fn encode_key(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

pub fn decode_key(key: &str) -> String {
    urlencoding::decode(key)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| key.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    Memory,
    Sqlite,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheConfig {
    /// In-process map, optionally loaded from and saved to a JSON snapshot.
    Memory { snapshot: Option<Utf8PathBuf> },
    /// SQLite database file; `None` opens a private in-memory database.
    Sqlite { path: Option<Utf8PathBuf> },
    /// Redis server with separate databases for flags and metadata.
    Redis {
        url: String,
        flags_db: i64,
        meta_db: i64,
    },
}

impl CacheConfig {
    pub fn kind(&self) -> CacheKind {
        match self {
            CacheConfig::Memory { .. } => CacheKind::Memory,
            CacheConfig::Sqlite { .. } => CacheKind::Sqlite,
            CacheConfig::Redis { .. } => CacheKind::Redis,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Memory { snapshot: None }
    }
}

pub struct CacheFactory;

impl CacheFactory {
    pub fn create(config: &CacheConfig) -> Result<Arc<dyn ValidationCache>, CiteIdError> {
        match config {
            CacheConfig::Memory { snapshot: None } => Ok(Arc::new(MemoryCache::new())),
            CacheConfig::Memory {
                snapshot: Some(path),
            } => Ok(Arc::new(MemoryCache::open(path.clone())?)),
            CacheConfig::Sqlite { path: None } => Ok(Arc::new(SqliteCache::open_in_memory()?)),
            CacheConfig::Sqlite { path: Some(path) } => Ok(Arc::new(SqliteCache::open(path)?)),
            CacheConfig::Redis {
                url,
                flags_db,
                meta_db,
            } => Ok(Arc::new(RedisCache::connect(url, *flags_db, *meta_db)?)),
        }
    }
}
