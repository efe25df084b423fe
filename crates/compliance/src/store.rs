use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::{ComplianceError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl StoreValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            Self::Text(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Text(raw) => raw.trim().parse().ok(),
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }

    fn decode(kind: &str, raw: String) -> Option<Self> {
        match kind {
            "bool" => raw.parse().ok().map(Self::Bool),
            "int" => raw.parse().ok().map(Self::Int),
            "text" => Some(Self::Text(raw)),
            _ => None,
        }
    }
}

/// Durable key-value settings. Each key has exactly one writer, so writes
/// are last-writer-wins without transactions.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoreValue>>;

    fn set(&self, key: &str, value: StoreValue) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, StoreValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, StoreValue>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoreValue>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: StoreValue) -> Result<()> {
        self.values().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    ComplianceError::Store(format!(
                        "failed creating settings dir {}: {}",
                        parent.display(),
                        err
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<StoreValue>> {
        let row: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT kind, value FROM settings WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(kind, raw)| {
            let decoded = StoreValue::decode(&kind, raw);
            if decoded.is_none() {
                debug!(key, kind = %kind, "ignoring undecodable setting");
            }
            decoded
        }))
    }

    fn set(&self, key: &str, value: StoreValue) -> Result<()> {
        self.conn().execute(
            "INSERT INTO settings(key, kind, value) VALUES(?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET kind = excluded.kind, value = excluded.value",
            params![key, value.kind(), value.encode()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}
