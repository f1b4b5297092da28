//! SQLite-backed record store

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use crate::record::{Filter, FilterOp, IndexValue, Record};

/// Database file created inside the store directory
pub const DB_FILE_NAME: &str = "tripstore.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE TABLE IF NOT EXISTS record_indexes (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    field TEXT NOT NULL,
    value_text TEXT,
    value_int INTEGER,
    PRIMARY KEY (collection, id, field)
);
CREATE INDEX IF NOT EXISTS idx_record_indexes_field
    ON record_indexes (collection, field, value_text, value_int);
";

/// Durable record store
///
/// Not `Sync`: callers that share a store across tasks wrap it in an actor
/// (see the engine's `StateManager`).
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create a store in the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        debug!(dir = %dir.display(), "Store::open: called");
        fs::create_dir_all(dir).context("Failed to create store directory")?;
        let db_path = dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path).context(format!("Failed to open {}", db_path.display()))?;
        conn.execute_batch(SCHEMA).context("Failed to initialize store schema")?;
        info!(path = %db_path.display(), "Opened trip store");
        Ok(Self {
            conn,
            path: Some(db_path),
        })
    }

    /// Create a throwaway in-memory store
    pub fn in_memory() -> Result<Self> {
        debug!("Store::in_memory: called");
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize store schema")?;
        Ok(Self { conn, path: None })
    }

    /// Database path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert a new record, failing if the id is already taken
    pub fn create<T: Record>(&mut self, record: T) -> Result<String> {
        let id = record.id().to_string();
        debug!(collection = T::collection_name(), %id, "Store::create: called");
        if self.exists::<T>(&id)? {
            return Err(eyre!("{} record already exists: {}", T::collection_name(), id));
        }
        self.write(&record)?;
        Ok(id)
    }

    /// Insert or replace a record
    pub fn update<T: Record>(&mut self, record: T) -> Result<()> {
        debug!(collection = T::collection_name(), id = %record.id(), "Store::update: called");
        self.write(&record)
    }

    /// Fetch a record by id
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        debug!(collection = T::collection_name(), %id, "Store::get: called");
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![T::collection_name(), id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => {
                let record = serde_json::from_str(&json)
                    .context(format!("Failed to decode {} record {}", T::collection_name(), id))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Whether a record with this id exists
    pub fn exists<T: Record>(&self, id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Delete a record and its index rows; returns whether it existed
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        debug!(collection = T::collection_name(), %id, "Store::delete: called");
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), id],
        )?;
        let removed = tx.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), id],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// List records matching all filters, oldest update first
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        debug!(collection = T::collection_name(), filter_count = filters.len(), "Store::list: called");
        let mut sql = String::from("SELECT r.data FROM records r WHERE r.collection = ?1");
        let mut values: Vec<SqlValue> = vec![SqlValue::Text(T::collection_name().to_string())];

        for filter in filters {
            let field_pos = values.len() + 1;
            values.push(SqlValue::Text(filter.field.clone()));
            let value_pos = values.len() + 1;
            let (column, value) = match (&filter.value, filter.op) {
                (IndexValue::String(s), FilterOp::Contains) => ("value_text", SqlValue::Text(format!("%{}%", s))),
                (IndexValue::String(s), _) => ("value_text", SqlValue::Text(s.clone())),
                (IndexValue::Int(i), _) => ("value_int", SqlValue::Integer(*i)),
                (IndexValue::Bool(b), _) => ("value_int", SqlValue::Integer(i64::from(*b))),
            };
            values.push(value);
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM record_indexes i WHERE i.collection = r.collection \
                 AND i.id = r.id AND i.field = ?{} AND i.{} {} ?{})",
                field_pos,
                column,
                filter.op.sql(),
                value_pos
            ));
        }
        sql.push_str(" ORDER BY r.updated_at ASC, r.id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            let json = row?;
            records.push(serde_json::from_str(&json).context(format!("Failed to decode {} record", T::collection_name()))?);
        }
        Ok(records)
    }

    /// Delete every record of a collection last updated before `cutoff_ms`
    ///
    /// Returns the ids that were removed.
    pub fn delete_older_than<T: Record>(&mut self, cutoff_ms: i64) -> Result<Vec<String>> {
        debug!(collection = T::collection_name(), cutoff_ms, "Store::delete_older_than: called");
        let ids: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM records WHERE collection = ?1 AND updated_at < ?2")?;
            let rows = stmt.query_map(params![T::collection_name(), cutoff_ms], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        for id in &ids {
            self.delete::<T>(id)?;
        }
        if !ids.is_empty() {
            info!(collection = T::collection_name(), removed = ids.len(), "Expired records");
        }
        Ok(ids)
    }

    /// Recompute index rows for every record of a collection
    pub fn rebuild_indexes<T: Record>(&mut self) -> Result<usize> {
        debug!(collection = T::collection_name(), "Store::rebuild_indexes: called");
        let records: Vec<T> = self.list(&[])?;
        let count = records.len();
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1",
            params![T::collection_name()],
        )?;
        for record in &records {
            write_indexes(&tx, record)?;
        }
        tx.commit()?;
        Ok(count)
    }

    fn write<T: Record>(&mut self, record: &T) -> Result<()> {
        let data = serde_json::to_string(record).context("Failed to encode record")?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![T::collection_name(), record.id(), data, record.updated_at()],
        )?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), record.id()],
        )?;
        write_indexes(&tx, record)?;
        tx.commit()?;
        Ok(())
    }
}

fn write_indexes<T: Record>(conn: &Connection, record: &T) -> Result<()> {
    for (field, value) in record.indexed_fields() {
        let (text, int) = match value {
            IndexValue::String(s) => (Some(s), None),
            IndexValue::Int(i) => (None, Some(i)),
            IndexValue::Bool(b) => (None, Some(i64::from(b))),
        };
        conn.execute(
            "INSERT INTO record_indexes (collection, id, field, value_text, value_int) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![T::collection_name(), record.id(), field, text, int],
        )?;
    }
    Ok(())
}
