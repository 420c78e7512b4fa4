use std::fmt;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::debug;

use crate::db::init_db;
use crate::error::Result;

/// Logical table of the key → document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Resources,
    Intents,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Resources => "resources",
            Table::Intents => "intents",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Durable key → value backend for the repositories.
///
/// Calls are synchronous and must be durable when they return.
pub trait Persistence: Send + Sync {
    /// Insert or replace the document stored under `key`.
    fn upsert(&self, table: Table, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting an absent key is not an error.
    fn delete(&self, table: Table, key: &str) -> Result<()>;

    /// Every `(key, value)` pair in `table`, in insertion order.
    fn load_all(&self, table: Table) -> Result<Vec<(String, String)>>;
}

/// SQLite-backed [`Persistence`].
///
/// Wraps a single connection in a `Mutex`; each statement auto-commits.
pub struct SqlitePersistence {
    db: Mutex<Connection>,
}

impl SqlitePersistence {
    /// Wrap `conn`, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }
}

impl Persistence for SqlitePersistence {
    fn upsert(&self, table: Table, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        // ON CONFLICT keeps the original rowid, so load order stays first-seen.
        db.execute(
            &format!(
                "INSERT INTO {table} (key, data, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET data = excluded.data,
                                                updated_at = excluded.updated_at"
            ),
            rusqlite::params![key, value, now],
        )?;
        debug!(%table, key, "row upserted");
        Ok(())
    }

    fn delete(&self, table: Table, key: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(&format!("DELETE FROM {table} WHERE key = ?1"), [key])?;
        debug!(%table, key, "row deleted");
        Ok(())
    }

    fn load_all(&self, table: Table) -> Result<Vec<(String, String)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!("SELECT key, data FROM {table} ORDER BY rowid"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_and_keeps_position() {
        let store = SqlitePersistence::in_memory().unwrap();
        store.upsert(Table::Intents, "a", "1").unwrap();
        store.upsert(Table::Intents, "b", "2").unwrap();
        store.upsert(Table::Intents, "a", "3").unwrap();

        let rows = store.load_all(Table::Intents).unwrap();
        assert_eq!(
            rows,
            vec![
                ("a".to_string(), "3".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn tables_are_independent() {
        let store = SqlitePersistence::in_memory().unwrap();
        store.upsert(Table::Intents, "k", "intent").unwrap();
        store.upsert(Table::Resources, "k", "record").unwrap();
        store.delete(Table::Intents, "k").unwrap();

        assert!(store.load_all(Table::Intents).unwrap().is_empty());
        assert_eq!(store.load_all(Table::Resources).unwrap().len(), 1);
    }

    #[test]
    fn delete_absent_key_is_ok() {
        let store = SqlitePersistence::in_memory().unwrap();
        store.delete(Table::Resources, "missing").unwrap();
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidrelay.db");
        {
            let store = SqlitePersistence::new(Connection::open(&path).unwrap()).unwrap();
            store.upsert(Table::Resources, "k", "v").unwrap();
        }
        let store = SqlitePersistence::new(Connection::open(&path).unwrap()).unwrap();
        assert_eq!(
            store.load_all(Table::Resources).unwrap(),
            vec![("k".to_string(), "v".to_string())]
        );
    }
}
