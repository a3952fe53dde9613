use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::{ValidationCache, ValidationRecord, decode_key, encode_key};
use crate::error::CiteIdError;
use crate::fs_util;
use crate::schemes::Metadata;

type Records = BTreeMap<String, ValidationRecord>;

/// Map held in memory. With a snapshot path the map is loaded on open and
/// written back on [`ValidationCache::persist`].
pub struct MemoryCache {
    records: Mutex<Records>,
    snapshot: Option<Utf8PathBuf>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Records::new()),
            snapshot: None,
        }
    }

    pub fn open(snapshot: Utf8PathBuf) -> Result<Self, CiteIdError> {
        let records = load_snapshot(&snapshot)?;
        debug!(path = %snapshot, entries = records.len(), "loaded cache snapshot");
        Ok(Self {
            records: Mutex::new(records),
            snapshot: Some(snapshot),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Utf8Path> {
        self.snapshot.as_deref()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn load_snapshot(path: &Utf8Path) -> Result<Records, CiteIdError> {
    let Some(content) = fs_util::read_optional(path)? else {
        return Ok(Records::new());
    };
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Records::new());
    }
    serde_json::from_slice(&content)
        .map_err(|err| CiteIdError::CacheFile(format!("parse {path}: {err}")))
}

impl ValidationCache for MemoryCache {
    fn get(&self, id: &str) -> Result<Option<bool>, CiteIdError> {
        Ok(self
            .lock()
            .get(&encode_key(id))
            .and_then(|record| record.valid))
    }

    fn set(&self, id: &str, valid: bool) -> Result<(), CiteIdError> {
        self.lock().entry(encode_key(id)).or_default().valid = Some(valid);
        Ok(())
    }

    fn set_full(&self, id: &str, record: &ValidationRecord) -> Result<(), CiteIdError> {
        self.lock()
            .entry(encode_key(id))
            .or_default()
            .merge_missing(record);
        Ok(())
    }

    fn metadata(&self, id: &str) -> Result<Metadata, CiteIdError> {
        Ok(self
            .lock()
            .get(&encode_key(id))
            .map(|record| record.metadata.clone())
            .unwrap_or_default())
    }

    fn delete_all(&self) -> Result<(), CiteIdError> {
        self.lock().clear();
        Ok(())
    }

    fn list_keys(&self) -> Result<BTreeSet<String>, CiteIdError> {
        Ok(self.lock().keys().map(|key| decode_key(key)).collect())
    }

    fn persist(&self) -> Result<(), CiteIdError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let content = {
            let records = self.lock();
            serde_json::to_vec_pretty(&*records)
                .map_err(|err| CiteIdError::CacheFile(err.to_string()))?
        };
        fs_util::write_atomic(path, &content)
    }
}
