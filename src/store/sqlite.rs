use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Persisted key-value settings, backed by a single SQLite table. Values are
/// JSON-encoded by the layer above; this type only moves strings.
pub struct SettingsDb {
    conn: Mutex<Connection>,
}

impl SettingsDb {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("open settings database: {}", path.display()))?;
        Self::init(conn)
    }

    /// In-memory database, used by tests.
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory settings database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("create settings table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read setting '{key}'"))?;
        Ok(value)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .with_context(|| format!("write setting '{key}'"))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])
            .with_context(|| format!("delete setting '{key}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let db = SettingsDb::memory().unwrap();

        assert_eq!(db.get("missing").unwrap(), None);

        db.put("key", "value").unwrap();
        assert_eq!(db.get("key").unwrap().as_deref(), Some("value"));

        // Upsert overwrites
        db.put("key", "other").unwrap();
        assert_eq!(db.get("key").unwrap().as_deref(), Some("other"));

        db.delete("key").unwrap();
        assert_eq!(db.get("key").unwrap(), None);

        // Deleting a missing key is not an error
        db.delete("key").unwrap();
    }
}
