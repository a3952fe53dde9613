use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, CacheKind};
use crate::error::CiteIdError;
use crate::oracle::{DEFAULT_TIMEOUT, RetryPolicy};
use crate::priority::{PriorityEntry, PriorityTable};

pub const DEFAULT_CONFIG_FILE: &str = "citeid.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub use_api_service: Option<bool>,
    #[serde(default)]
    pub cache: Option<CacheSection>,
    #[serde(default)]
    pub retry: Option<RetrySection>,
    #[serde(default)]
    pub doi_prefixes: Option<Vec<PriorityEntry>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default)]
    pub kind: CacheKind,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub flags_db: Option<i64>,
    #[serde(default)]
    pub meta_db: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetrySection {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub connect_pause_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub use_api_service: bool,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub priorities: PriorityTable,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            use_api_service: true,
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            priorities: PriorityTable::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CiteIdError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(CiteIdError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CiteIdError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CiteIdError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CiteIdError> {
        let defaults = ResolvedConfig::default();

        let cache = match config.cache {
            None => defaults.cache,
            Some(section) => resolve_cache(section)?,
        };

        let retry_section = config.retry.unwrap_or_default();
        let retry = RetryPolicy {
            max_attempts: retry_section
                .max_attempts
                .unwrap_or(defaults.retry.max_attempts),
            connect_pause: retry_section
                .connect_pause_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.connect_pause),
        };
        if retry.max_attempts == 0 {
            return Err(CiteIdError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        let timeout = retry_section
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let priorities = match config.doi_prefixes {
            None => defaults.priorities,
            Some(entries) => {
                if let Some(entry) = entries.iter().find(|entry| entry.priority == 0) {
                    return Err(CiteIdError::InvalidConfig(format!(
                        "priority of DOI prefix {} must be at least 1",
                        entry.prefix
                    )));
                }
                PriorityTable::new(entries)
            }
        };

        Ok(ResolvedConfig {
            use_api_service: config.use_api_service.unwrap_or(true),
            cache,
            retry,
            timeout,
            priorities,
        })
    }
}

fn resolve_cache(section: CacheSection) -> Result<CacheConfig, CiteIdError> {
    let path = section.path.map(Utf8PathBuf::from);
    match section.kind {
        CacheKind::Memory => Ok(CacheConfig::Memory { snapshot: path }),
        CacheKind::Sqlite => Ok(CacheConfig::Sqlite { path }),
        CacheKind::Redis => {
            let url = section.redis_url.ok_or_else(|| {
                CiteIdError::InvalidConfig("cache.redis_url is required for redis".to_string())
            })?;
            Ok(CacheConfig::Redis {
                url,
                flags_db: section.flags_db.unwrap_or(0),
                meta_db: section.meta_db.unwrap_or(1),
            })
        }
    }
}
