//! SQLite-backed settings store
//!
//! Provides a `SettingsStore` that keeps widget rows and their key/value
//! settings in a single database file. Each public method is one statement
//! or one transaction; the connection lock is never held across an await.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{LayoutUpdate, NewWidget, Settings, Widget};
use crate::error::StoreError;

const WIDGET_COLUMNS: &str = "id, type, x, y, width, height, z_index, created_at";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS widgets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        x INTEGER NOT NULL DEFAULT 0,
        y INTEGER NOT NULL DEFAULT 0,
        width INTEGER NOT NULL DEFAULT 2,
        height INTEGER NOT NULL DEFAULT 2,
        z_index INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS widget_settings (
        widget_id INTEGER NOT NULL REFERENCES widgets(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        UNIQUE (widget_id, key)
    );
"#;

/// Durable store for widgets and their settings
///
/// Thread-safe via an internal mutex on the connection; cheap to clone.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SettingsStore {
    /// Opens (or creates) the database at `path`, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        debug!(path = %path.display(), "opened settings database");
        Self::init(conn)
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Lists all widgets, back to front
    pub fn list_widgets(&self) -> Result<Vec<Widget>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM widgets ORDER BY z_index ASC, id ASC",
            WIDGET_COLUMNS
        ))?;
        let widgets = stmt
            .query_map([], row_to_widget)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(widgets)
    }

    pub fn get_widget(&self, id: i64) -> Result<Option<Widget>, StoreError> {
        let conn = self.lock()?;
        Ok(query_widget(&conn, id)?)
    }

    /// Inserts a widget on top of the stack together with its initial settings
    pub fn create_widget(
        &self,
        widget: &NewWidget,
        settings: &Settings,
    ) -> Result<Widget, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let max_z: Option<i64> =
            tx.query_row("SELECT MAX(z_index) FROM widgets", [], |row| row.get(0))?;
        let z_index = max_z.unwrap_or(0) + 1;

        tx.execute(
            "INSERT INTO widgets (type, x, y, width, height, z_index) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                widget.widget_type,
                widget.x,
                widget.y,
                widget.width,
                widget.height,
                z_index
            ],
        )?;
        let id = tx.last_insert_rowid();

        for (key, value) in settings.iter() {
            upsert(&tx, id, key, value)?;
        }

        let created = query_widget(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(created)
    }

    /// Applies a partial layout update; returns `None` if the widget is absent
    pub fn update_layout(
        &self,
        id: i64,
        update: &LayoutUpdate,
    ) -> Result<Option<Widget>, StoreError> {
        let conn = self.lock()?;
        let Some(existing) = query_widget(&conn, id)? else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE widgets SET x = ?1, y = ?2, width = ?3, height = ?4, z_index = ?5 WHERE id = ?6",
            params![
                update.x.unwrap_or(existing.x),
                update.y.unwrap_or(existing.y),
                update.width.unwrap_or(existing.width),
                update.height.unwrap_or(existing.height),
                update.z_index.unwrap_or(existing.z_index),
                id
            ],
        )?;

        Ok(query_widget(&conn, id)?)
    }

    /// Deletes a widget and all of its settings; returns whether it existed
    pub fn delete_widget(&self, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM widget_settings WHERE widget_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM widgets WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Loads the full settings mapping of a widget, cache state included
    pub fn get_settings(&self, widget_id: i64) -> Result<Settings, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM widget_settings WHERE widget_id = ?1")?;
        let rows = stmt.query_map([widget_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut settings = Settings::new();
        for row in rows {
            let (key, value) = row?;
            settings.insert(key, value);
        }
        Ok(settings)
    }

    pub fn upsert_setting(&self, widget_id: i64, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        upsert(&conn, widget_id, key, value)?;
        Ok(())
    }

    /// Upserts several settings as one unit
    pub fn upsert_settings(&self, widget_id: i64, settings: &Settings) -> Result<(), StoreError> {
        self.apply(widget_id, &[], settings)
    }

    pub fn delete_settings(&self, widget_id: i64, keys: &[&str]) -> Result<(), StoreError> {
        self.apply(widget_id, keys, &Settings::new())
    }

    /// Deletes `remove` and then upserts `upsert`, in a single transaction
    pub fn apply(
        &self,
        widget_id: i64,
        remove: &[&str],
        upsert_values: &Settings,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for key in remove {
            tx.execute(
                "DELETE FROM widget_settings WHERE widget_id = ?1 AND key = ?2",
                params![widget_id, key],
            )?;
        }
        for (key, value) in upsert_values.iter() {
            upsert(&tx, widget_id, key, value)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert(conn: &Connection, widget_id: i64, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO widget_settings (widget_id, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(widget_id, key) DO UPDATE SET value = excluded.value",
        params![widget_id, key, value],
    )?;
    Ok(())
}

fn query_widget(conn: &Connection, id: i64) -> rusqlite::Result<Option<Widget>> {
    conn.query_row(
        &format!("SELECT {} FROM widgets WHERE id = ?1", WIDGET_COLUMNS),
        [id],
        row_to_widget,
    )
    .optional()
}

fn row_to_widget(row: &Row<'_>) -> rusqlite::Result<Widget> {
    Ok(Widget {
        id: row.get(0)?,
        widget_type: row.get(1)?,
        x: row.get(2)?,
        y: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        z_index: row.get(6)?,
        created_at: row.get(7)?,
    })
}
