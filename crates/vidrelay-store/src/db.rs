use rusqlite::Connection;

use crate::error::Result;

/// Initialise the engine schema in `conn`.
///
/// Both tables are plain key → JSON document maps; the repositories own the
/// document shape. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS resources (
            key         TEXT    NOT NULL PRIMARY KEY,
            data        TEXT    NOT NULL,   -- JSON-encoded cache entry
            updated_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS intents (
            key         TEXT    NOT NULL PRIMARY KEY,
            data        TEXT    NOT NULL,   -- JSON-encoded Intent
            updated_at  TEXT    NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
