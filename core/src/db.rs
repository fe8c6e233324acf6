mod catalog;
mod ledger;

use std::path::Path;

use chrono::Local;
use rusqlite::{Connection, ErrorCode, params};

use crate::error::{LedgerError, Result};
use crate::models::EntryKind;

/// Local store for the component catalog and every ledger collection.
///
/// Writes are single statements or explicit transactions, so a failed write
/// never leaves a partial record behind.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS components (
                    id TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL,
                    category TEXT NOT NULL,
                    protein REAL NOT NULL DEFAULT 0,
                    net_carbs REAL NOT NULL DEFAULT 0,
                    fat REAL NOT NULL DEFAULT 0,
                    calories REAL NOT NULL DEFAULT 0,
                    default_portion TEXT,
                    tags TEXT NOT NULL DEFAULT '[]',
                    is_user_defined INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_components_category ON components(category);
                CREATE INDEX IF NOT EXISTS idx_components_user_defined ON components(is_user_defined);

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );",
            )?;

            // Every entry kind shares one shape: the kind-specific body is a JSON payload.
            for kind in EntryKind::ALL {
                let table = kind.table();
                self.conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        id TEXT PRIMARY KEY NOT NULL,
                        ts TEXT NOT NULL,
                        synced INTEGER NOT NULL DEFAULT 0,
                        payload TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_{table}_ts ON {table}(ts);
                    CREATE INDEX IF NOT EXISTS idx_{table}_synced ON {table}(synced);"
                ))?;
            }

            self.conn.pragma_update(None, "user_version", 1)?;
        }

        Ok(())
    }

    /// Runs `f` inside one transaction: committed when it returns `Ok`, rolled
    /// back otherwise. Writes made through `self` inside `f` join it.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    // --- User Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM user_settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM user_settings ORDER BY key")?;
        let settings = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(settings)
    }
}

/// Maps a primary-key collision on insert to a validation failure.
fn duplicate_id(err: rusqlite::Error, what: &str, id: &str) -> LedgerError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            LedgerError::validation(format!("{what} id {id} already exists"))
        }
        _ => LedgerError::Storage(err),
    }
}

/// Wraps a decode failure so it can be returned from a rusqlite row mapper.
fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
