pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the feedsift database at the given path, with sqlite-vec
/// loaded and schema initialized.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database for testing.
#[cfg(test)]
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Encode an embedding as the little-endian `f32` BLOB sqlite-vec reads.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a stored embedding BLOB. Trailing bytes that do not form a full
/// `f32` are ignored.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

// ── Scoped connection ─────────────────────────────────────────────────────────

/// Exclusive ownership of the store connection for one pipeline run.
///
/// [`StoreSession::close`] closes the connection exactly once and surfaces
/// close errors. If a session is dropped without being closed (early return,
/// panic unwinding through a stage), `Drop` performs the close instead.
pub struct StoreSession {
    conn: Option<Connection>,
    label: String,
}

impl StoreSession {
    /// Open the database at `path` and take ownership of the connection.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let conn = open_database(&path)?;
        Ok(Self {
            conn: Some(conn),
            label: path.display().to_string(),
        })
    }

    /// Wrap an already-open connection (used for in-memory stores).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            label: ":memory:".into(),
        }
    }

    pub fn connection(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .expect("connection is present until the session is closed")
    }

    /// Close the connection. Consumes the session so it cannot be closed twice.
    pub fn close(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => close_connection(conn, &self.label),
            None => Ok(()),
        }
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!(store = %self.label, "store session dropped without explicit close");
            if let Err(e) = close_connection(conn, &self.label) {
                tracing::error!(store = %self.label, error = %e, "failed to close store connection");
            }
        }
    }
}

fn close_connection(conn: Connection, label: &str) -> Result<()> {
    conn.close()
        .map_err(|(_conn, e)| e)
        .with_context(|| format!("failed to close database {label}"))?;
    tracing::debug!(store = %label, "store connection closed");
    Ok(())
}

// ── Health ────────────────────────────────────────────────────────────────────

/// Snapshot of store health used by `feedsift doctor`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub message_count: i64,
    pub pending_message_count: i64,
    pub sighting_count: i64,
    pub reference_count: i64,
    pub category_count: i64,
    pub score_count: i64,
}

/// Run integrity checks and gather row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity check failed to run")?;
    let sqlite_vec_version: String = conn
        .query_row("SELECT vec_version()", [], |row| row.get(0))
        .context("sqlite-vec is not loaded")?;

    let count = |sql: &str| -> Result<i64> {
        conn.query_row(sql, [], |row| row.get(0))
            .with_context(|| format!("count query failed: {sql}"))
    };

    Ok(HealthReport {
        integrity_ok: integrity_details == "ok",
        integrity_details,
        schema_version: migrations::get_schema_version(conn)?,
        sqlite_vec_version,
        embedding_model: migrations::get_embedding_model(conn)?,
        message_count: count("SELECT COUNT(*) FROM messages")?,
        pending_message_count: count("SELECT COUNT(*) FROM messages WHERE embedding IS NULL")?,
        sighting_count: count("SELECT COUNT(*) FROM feed_sightings")?,
        reference_count: count("SELECT COUNT(*) FROM reference_items")?,
        category_count: count(
            "SELECT COUNT(*) FROM (SELECT DISTINCT topic, industry FROM reference_items)",
        )?,
        score_count: count("SELECT COUNT(*) FROM classification_scores")?,
    })
}
