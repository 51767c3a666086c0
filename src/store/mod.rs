//! Embedded SQL persistence: schema, prepared-statement writer, bounded
//! reader. Backed by `rusqlite` in WAL mode.

mod reader;
mod schema;
mod writer;

pub use reader::Reader;
pub use writer::{TickCounts, Writer};

use std::path::Path;

use rusqlite::Connection;

/// Store-layer failures. Covers most of the error kinds named in
/// `spec.md` §7 (`Open`, `Exec`, `Prepare`, `Step`, `Bind`); there is no
/// separate `Reset` variant, since `Connection::prepare_cached` resets
/// and clears bindings on cached statements internally. `TxnBegin`/
/// `TxnCommit` are not in that list but are needed here to distinguish a
/// failed transaction boundary from a failed row write.
#[derive(Debug)]
pub enum StoreError {
    Open(String),
    Exec(String),
    Prepare(String),
    Step(String),
    Bind(String),
    TxnBegin(String),
    TxnCommit(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Open(m) => write!(f, "store open error: {m}"),
            StoreError::Exec(m) => write!(f, "store exec error: {m}"),
            StoreError::Prepare(m) => write!(f, "store prepare error: {m}"),
            StoreError::Step(m) => write!(f, "store step error: {m}"),
            StoreError::Bind(m) => write!(f, "store bind error: {m}"),
            StoreError::TxnBegin(m) => write!(f, "transaction begin error: {m}"),
            StoreError::TxnCommit(m) => write!(f, "transaction commit error: {m}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Exec(e.to_string())
    }
}

/// Owns the one SQLite connection used by both `Writer` and `Reader` in
/// this single-threaded process.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if absent) the database at `path`, sets WAL +
    /// tuned pragmas, and applies the idempotent schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(|e| StoreError::Open(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Open(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| StoreError::Open(e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))
            .map_err(|e| StoreError::Open(e.to_string()))?;
        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Opens an in-memory database; used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn writer(&self) -> Writer<'_> {
        Writer::new(&self.conn)
    }

    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_applies_schema_idempotently() {
        let store = Store::open_in_memory().unwrap();
        // Re-running the schema on the same connection must not error.
        store.conn.execute_batch(schema::SCHEMA_SQL).unwrap();
    }

    #[test]
    fn open_on_disk_sets_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent-watch.db");
        let store = Store::open(&path).unwrap();
        let mode: String = store
            .conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
