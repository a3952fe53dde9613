use std::collections::BTreeSet;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use camino::Utf8Path;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use super::{ValidationCache, ValidationRecord, decode_key, encode_key};
use crate::error::CiteIdError;
use crate::schemes::Metadata;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS info (
        id TEXT PRIMARY KEY,
        valid INTEGER
    );

    CREATE TABLE IF NOT EXISTS info_metadata (
        id TEXT NOT NULL,
        field TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (id, field)
    );
"#;

/// Validity flags in `info`, metadata one row per field in `info_metadata`.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

fn sql_err(err: rusqlite::Error) -> CiteIdError {
    CiteIdError::CacheSql(err.to_string())
}

impl SqliteCache {
    pub fn open(path: &Utf8Path) -> Result<Self, CiteIdError> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| CiteIdError::Filesystem(format!("create {parent}: {err}")))?;
        }
        let conn = Connection::open(path.as_std_path()).map_err(sql_err)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, CiteIdError> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, CiteIdError> {
        conn.execute_batch(SCHEMA).map_err(sql_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ValidationCache for SqliteCache {
    fn get(&self, id: &str) -> Result<Option<bool>, CiteIdError> {
        let valid: Option<Option<i64>> = self
            .lock()
            .query_row(
                "SELECT valid FROM info WHERE id = ?1",
                [encode_key(id)],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)?;
        Ok(valid.flatten().map(|flag| flag != 0))
    }

    fn set(&self, id: &str, valid: bool) -> Result<(), CiteIdError> {
        self.lock()
            .execute(
                "INSERT INTO info (id, valid) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET valid = excluded.valid",
                params![encode_key(id), valid as i64],
            )
            .map_err(sql_err)?;
        Ok(())
    }

    fn set_full(&self, id: &str, record: &ValidationRecord) -> Result<(), CiteIdError> {
        let key = encode_key(id);
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(sql_err)?;
        tx.execute(
            "INSERT INTO info (id, valid) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET valid = COALESCE(info.valid, excluded.valid)",
            params![key, record.valid.map(|flag| flag as i64)],
        )
        .map_err(sql_err)?;
        for (field, value) in &record.metadata {
            if field == "valid" {
                continue;
            }
            tx.execute(
                "INSERT OR IGNORE INTO info_metadata (id, field, value) VALUES (?1, ?2, ?3)",
                params![key, field, value.to_string()],
            )
            .map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;
        Ok(())
    }

    fn metadata(&self, id: &str) -> Result<Metadata, CiteIdError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT field, value FROM info_metadata WHERE id = ?1 ORDER BY field")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([encode_key(id)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(sql_err)?;
        let mut metadata = Metadata::new();
        for row in rows {
            let (field, raw) = row.map_err(sql_err)?;
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            metadata.insert(field, value);
        }
        Ok(metadata)
    }

    fn delete_all(&self) -> Result<(), CiteIdError> {
        self.lock()
            .execute_batch("DELETE FROM info; DELETE FROM info_metadata;")
            .map_err(sql_err)
    }

    fn list_keys(&self) -> Result<BTreeSet<String>, CiteIdError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id FROM info UNION SELECT id FROM info_metadata")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql_err)?;
        let mut keys = BTreeSet::new();
        for row in rows {
            keys.insert(decode_key(&row.map_err(sql_err)?));
        }
        Ok(keys)
    }

    fn persist(&self) -> Result<(), CiteIdError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flags_stored_as_integers() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache.set("pmid:1", true).unwrap();
        let stored: i64 = cache
            .lock()
            .query_row("SELECT valid FROM info", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, 1);
    }

    #[test]
    fn metadata_values_keep_json_types() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("count".to_string(), json!(3));
        metadata.insert("title".to_string(), json!("A"));
        cache
            .set_full("doi:10.1/x", &ValidationRecord::new(true, metadata))
            .unwrap();
        let read = cache.metadata("doi:10.1/x").unwrap();
        assert_eq!(read["count"], 3);
        assert_eq!(read["title"], "A");
        assert_eq!(cache.get("doi:10.1/x").unwrap(), Some(true));
    }
}
