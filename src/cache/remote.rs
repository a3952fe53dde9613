use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use redis::{Client, Commands, Connection};
use serde_json::Value;

use super::{ValidationCache, ValidationRecord};
use crate::error::CiteIdError;
use crate::schemes::Metadata;

/// Redis backend. Flags live as `"1"`/`"0"` strings in one database and
/// metadata as hashes in another, both keyed by the plain identifier.
pub struct RedisCache {
    flags: Mutex<Connection>,
    meta: Mutex<Connection>,
}

fn redis_err(err: redis::RedisError) -> CiteIdError {
    CiteIdError::CacheRemote(err.to_string())
}

fn select(client: &Client, db: i64) -> Result<Connection, CiteIdError> {
    let mut conn = client.get_connection().map_err(redis_err)?;
    redis::cmd("SELECT")
        .arg(db)
        .query::<()>(&mut conn)
        .map_err(redis_err)?;
    Ok(conn)
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|err| err.into_inner())
}

impl RedisCache {
    pub fn connect(url: &str, flags_db: i64, meta_db: i64) -> Result<Self, CiteIdError> {
        let client = Client::open(url).map_err(redis_err)?;
        Ok(Self {
            flags: Mutex::new(select(&client, flags_db)?),
            meta: Mutex::new(select(&client, meta_db)?),
        })
    }
}

fn flag_value(valid: bool) -> &'static str {
    if valid { "1" } else { "0" }
}

impl ValidationCache for RedisCache {
    fn get(&self, id: &str) -> Result<Option<bool>, CiteIdError> {
        let stored: Option<String> = lock(&self.flags).get(id).map_err(redis_err)?;
        Ok(stored.map(|flag| matches!(flag.as_str(), "1" | "true" | "True")))
    }

    fn set(&self, id: &str, valid: bool) -> Result<(), CiteIdError> {
        lock(&self.flags)
            .set::<_, _, ()>(id, flag_value(valid))
            .map_err(redis_err)
    }

    fn set_full(&self, id: &str, record: &ValidationRecord) -> Result<(), CiteIdError> {
        if let Some(valid) = record.valid {
            lock(&self.flags)
                .set_nx::<_, _, ()>(id, flag_value(valid))
                .map_err(redis_err)?;
        }
        let mut meta = lock(&self.meta);
        for (field, value) in &record.metadata {
            if field == "valid" {
                continue;
            }
            meta.hset_nx::<_, _, _, ()>(id, field, value.to_string())
                .map_err(redis_err)?;
        }
        Ok(())
    }

    fn metadata(&self, id: &str) -> Result<Metadata, CiteIdError> {
        let stored: HashMap<String, String> = lock(&self.meta).hgetall(id).map_err(redis_err)?;
        let mut metadata = Metadata::new();
        for (field, raw) in stored {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            metadata.insert(field, value);
        }
        Ok(metadata)
    }

    fn delete_all(&self) -> Result<(), CiteIdError> {
        for conn in [&self.flags, &self.meta] {
            redis::cmd("FLUSHDB")
                .query::<()>(&mut *lock(conn))
                .map_err(redis_err)?;
        }
        Ok(())
    }

    fn list_keys(&self) -> Result<BTreeSet<String>, CiteIdError> {
        let mut keys = BTreeSet::new();
        for conn in [&self.flags, &self.meta] {
            let found: Vec<String> = lock(conn).keys("*").map_err(redis_err)?;
            keys.extend(found);
        }
        Ok(keys)
    }

    fn persist(&self) -> Result<(), CiteIdError> {
        Ok(())
    }
}
