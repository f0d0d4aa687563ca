//! Hierarchical key-value storage with per-path subscriptions.
//!
//! Paths are `/`-separated (`students/<id>/attendance/<date>`). A value stored
//! at a path is an opaque JSON document; descendants are separate rows, so a
//! write to one key never touches its siblings. There are no cross-key
//! transactions and no conditional writes.

use crate::db;
use crate::error::{CoreError, CoreResult};
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

/// A write observed by a subscriber. `path` is the path that was written or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: String,
}

/// Push channel for changes at or under (or above) a watched path.
pub struct Subscription {
    path: String,
    receiver: Receiver<Change>,
}

impl Subscription {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Drain everything delivered since the last call without blocking.
    pub fn drain(&self) -> Vec<Change> {
        self.receiver.try_iter().collect()
    }
}

pub trait Store {
    fn get(&self, path: &str) -> CoreResult<Option<Value>>;
    fn set(&self, path: &str, value: &Value) -> CoreResult<()>;
    /// Merge top-level fields into the object at `path` (read-modify-write, no CAS).
    fn update(&self, path: &str, patch: &Map<String, Value>) -> CoreResult<()>;
    /// Delete `path` and every descendant.
    fn remove(&self, path: &str) -> CoreResult<()>;
    /// Direct children of `path`, in insertion order.
    fn children(&self, path: &str) -> CoreResult<Vec<(String, Value)>>;
    fn subscribe(&self, path: &str) -> Subscription;
}

/// Validate a single path segment supplied by a caller (ids, dates, labels).
pub fn segment<'a>(what: &str, raw: &'a str) -> CoreResult<&'a str> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(CoreError::validation(format!("{} must not be empty", what)));
    }
    if t.contains('/') {
        return Err(CoreError::validation(format!("{} must not contain '/'", what)));
    }
    Ok(t)
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, key)) => (parent, key),
        None => ("", path),
    }
}

fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

struct Watcher {
    path: String,
    sender: Sender<Change>,
}

pub struct SqliteStore {
    conn: Connection,
    watchers: Mutex<Vec<Watcher>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(db::open_db(workspace)?))
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(db::open_memory()?))
    }

    fn notify(&self, path: &str) {
        let mut watchers = match self.watchers.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A removal of an ancestor invalidates the watched subtree too.
        watchers.retain(|w| {
            if !is_same_or_descendant(path, &w.path) && !is_same_or_descendant(&w.path, path) {
                return true;
            }
            w.sender
                .send(Change {
                    path: path.to_string(),
                })
                .is_ok()
        });
    }

    fn decode(path: &str, raw: &str) -> CoreResult<Value> {
        serde_json::from_str(raw).map_err(|source| CoreError::Malformed {
            path: path.to_string(),
            source,
        })
    }

    fn write(&self, path: &str, value: &Value) -> CoreResult<()> {
        let (parent, key) = split_parent(path);
        let encoded = value.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO nodes(path, parent, key, value, seq, updated_at)
             VALUES(?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(seq), 0) + 1 FROM nodes), ?5)
             ON CONFLICT(path) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            (path, parent, key, &encoded, &now),
        )?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn get(&self, path: &str) -> CoreResult<Option<Value>> {
        let path = normalize(path);
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM nodes WHERE path = ?", [&path], |r| {
                r.get(0)
            })
            .optional()?;
        raw.map(|r| Self::decode(&path, &r)).transpose()
    }

    fn set(&self, path: &str, value: &Value) -> CoreResult<()> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(CoreError::validation("cannot write the root path"));
        }
        self.write(&path, value)?;
        self.notify(&path);
        Ok(())
    }

    fn update(&self, path: &str, patch: &Map<String, Value>) -> CoreResult<()> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(CoreError::validation("cannot write the root path"));
        }
        let mut current = match self.get(&path)? {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        for (k, v) in patch {
            if v.is_null() {
                current.remove(k);
            } else {
                current.insert(k.clone(), v.clone());
            }
        }
        self.write(&path, &Value::Object(current))?;
        self.notify(&path);
        Ok(())
    }

    fn remove(&self, path: &str) -> CoreResult<()> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(CoreError::validation("cannot remove the root path"));
        }
        let prefix = format!("{}/", path);
        self.conn.execute(
            "DELETE FROM nodes WHERE path = ?1 OR substr(path, 1, ?2) = ?3",
            (&path, prefix.chars().count() as i64, &prefix),
        )?;
        self.notify(&path);
        Ok(())
    }

    fn children(&self, path: &str) -> CoreResult<Vec<(String, Value)>> {
        let path = normalize(path);
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, path FROM nodes WHERE parent = ? ORDER BY seq")?;
        let rows = stmt
            .query_map([&path], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(key, raw, full)| Ok((key, Self::decode(&full, &raw)?)))
            .collect()
    }

    fn subscribe(&self, path: &str) -> Subscription {
        let path = normalize(path);
        let (sender, receiver) = mpsc::channel();
        let mut watchers = match self.watchers.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        watchers.push(Watcher {
            path: path.clone(),
            sender,
        });
        Subscription { path, receiver }
    }
}
