//! Local store collaborator: the vault the reconciler reads and tags.
//!
//! [`SqliteVault`] keeps entries, their ordered tags and their ordered
//! external references in a single SQLite file.

use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::models::{EntryId, ListOptions, LocalEntry};

/// Read/write surface the reconciler needs from the vault.
pub trait LocalStore: Send + Sync {
    fn list_entries(&self, options: ListOptions) -> Result<Vec<LocalEntry>, StoreError>;

    /// Replace the entry's tag set.
    fn update_tags(&self, id: &EntryId, tags: &[String]) -> Result<(), StoreError>;
}

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS entries (
        id TEXT PRIMARY KEY,
        title TEXT,
        deleted INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS entry_tags (
        entry_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        tag TEXT NOT NULL,
        PRIMARY KEY (entry_id, position)
    );

    CREATE TABLE IF NOT EXISTS entry_refs (
        entry_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        url TEXT NOT NULL,
        PRIMARY KEY (entry_id, position)
    );
";

/// SQLite-backed vault.
pub struct SqliteVault {
    conn: Mutex<Connection>,
}

impl SqliteVault {
    /// Open (or create) a vault file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("vault connection lock poisoned".to_string()))
    }

    /// Insert a new entry with its tags and references.
    pub fn insert_entry(&self, entry: &LocalEntry) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO entries (id, title) VALUES (?1, ?2)",
            params![entry.id.as_str(), entry.title],
        )?;
        {
            let mut tag_stmt = tx.prepare_cached(
                "INSERT INTO entry_tags (entry_id, position, tag) VALUES (?1, ?2, ?3)",
            )?;
            for (pos, tag) in entry.tags.iter().enumerate() {
                tag_stmt.execute(params![entry.id.as_str(), pos as i64, tag])?;
            }

            let mut ref_stmt = tx.prepare_cached(
                "INSERT INTO entry_refs (entry_id, position, url) VALUES (?1, ?2, ?3)",
            )?;
            for (pos, url) in entry.external_refs.iter().enumerate() {
                ref_stmt.execute(params![entry.id.as_str(), pos as i64, url])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Soft-delete an entry; it stays in the file but drops out of default listings.
    pub fn mark_deleted(&self, id: &EntryId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute("UPDATE entries SET deleted = 1 WHERE id = ?1", [id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn load_relation(
        conn: &Connection,
        sql: &str,
    ) -> Result<FxHashMap<String, Vec<String>>, StoreError> {
        let mut map: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let entry_id: String = row.get(0)?;
            let value: String = row.get(1)?;
            map.entry(entry_id).or_default().push(value);
        }
        Ok(map)
    }
}

impl LocalStore for SqliteVault {
    fn list_entries(&self, options: ListOptions) -> Result<Vec<LocalEntry>, StoreError> {
        let conn = self.lock()?;

        let mut entries = Vec::new();
        {
            let mut stmt = conn.prepare(
                "SELECT id, title FROM entries WHERE (?1 OR deleted = 0) ORDER BY rowid",
            )?;
            let mut rows = stmt.query([options.include_deleted])?;
            while let Some(row) = rows.next()? {
                entries.push(LocalEntry {
                    id: EntryId::new(row.get::<_, String>(0)?),
                    title: row.get(1)?,
                    tags: Vec::new(),
                    external_refs: Vec::new(),
                });
            }
        }

        if options.include_relations {
            let mut tags = Self::load_relation(
                &conn,
                "SELECT entry_id, tag FROM entry_tags ORDER BY entry_id, position",
            )?;
            let mut refs = Self::load_relation(
                &conn,
                "SELECT entry_id, url FROM entry_refs ORDER BY entry_id, position",
            )?;
            for entry in &mut entries {
                entry.tags = tags.remove(entry.id.as_str()).unwrap_or_default();
                entry.external_refs = refs.remove(entry.id.as_str()).unwrap_or_default();
            }
        }

        Ok(entries)
    }

    fn update_tags(&self, id: &EntryId, tags: &[String]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let exists = tx
            .query_row("SELECT 1 FROM entries WHERE id = ?1", [id.as_str()], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound(id.to_string()));
        }

        tx.execute("DELETE FROM entry_tags WHERE entry_id = ?1", [id.as_str()])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO entry_tags (entry_id, position, tag) VALUES (?1, ?2, ?3)",
            )?;
            for (pos, tag) in tags.iter().enumerate() {
                stmt.execute(params![id.as_str(), pos as i64, tag])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
