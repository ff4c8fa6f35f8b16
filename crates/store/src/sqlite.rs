//! SQLite item table

use crate::error::StoreError;
use crate::table::{ItemKey, Table, WriteOp};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// Items stored as JSON bodies keyed by `(ledger, entry)`
pub struct SqliteTable {
    conn: Mutex<Connection>,
}

impl SqliteTable {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let table = Self {
            conn: Mutex::new(conn),
        };
        table.init_schema()?;
        Ok(table)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let table = Self {
            conn: Mutex::new(conn),
        };
        table.init_schema()?;
        Ok(table)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                ledger TEXT NOT NULL,
                entry TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (ledger, entry)
            )",
            [],
        )?;
        Ok(())
    }
}

fn select(conn: &Connection, key: &ItemKey) -> Result<Option<Value>, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM items WHERE ledger = ?1 AND entry = ?2",
            params![key.ledger, key.entry],
            |row| row.get(0),
        )
        .optional()?;

    body.map(|body| serde_json::from_str(&body))
        .transpose()
        .map_err(StoreError::from)
}

fn upsert(conn: &Connection, key: &ItemKey, item: &Value) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO items (ledger, entry, body) VALUES (?1, ?2, ?3)",
        params![key.ledger, key.entry, serde_json::to_string(item)?],
    )?;
    Ok(())
}

fn remove(conn: &Connection, key: &ItemKey) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM items WHERE ledger = ?1 AND entry = ?2",
        params![key.ledger, key.entry],
    )?;
    Ok(())
}

#[async_trait]
impl Table for SqliteTable {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Value>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        select(&conn, key)
    }

    async fn query_items(&self, ledger: &str, prefix: &str) -> Result<Vec<Value>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT body FROM items
             WHERE ledger = ?1 AND substr(entry, 1, length(?2)) = ?2
             ORDER BY entry ASC",
        )?;

        let bodies: Vec<String> = stmt
            .query_map(params![ledger, prefix], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StoreError::from))
            .collect()
    }

    async fn put_item(&self, item: Value) -> Result<(), StoreError> {
        let key = ItemKey::of(&item)?;
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        upsert(&conn, &key, &item)
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        remove(&conn, key)
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = conn.transaction()?;

        let mut keys = Vec::with_capacity(ops.len());
        for op in &ops {
            let key = op.key()?;
            if let Some(condition) = op.condition() {
                if !condition.holds(select(&tx, &key)?.as_ref()) {
                    // dropping `tx` rolls back
                    return Err(StoreError::ConditionFailed(key.to_string()));
                }
            }
            keys.push(key);
        }

        for (op, key) in ops.iter().zip(&keys) {
            match op {
                WriteOp::Put { item, .. } => upsert(&tx, key, item)?,
                WriteOp::Delete { .. } => remove(&tx, key)?,
            }
        }

        tx.commit()?;
        Ok(())
    }
}
