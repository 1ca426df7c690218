//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use rusqlite::Connection;

type Migration = fn(&Connection) -> rusqlite::Result<()>;

/// Steps applied on top of the base schema. Entry `i` upgrades version
/// `i + 1` to `i + 2`.
const MIGRATIONS: &[Migration] = &[];

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1 + MIGRATIONS.len() as u32;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Get the embedding model the stored vectors were produced with, if recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations. Each migration runs in a transaction.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    if version > CURRENT_SCHEMA_VERSION {
        tracing::warn!(
            schema_version = version,
            supported = CURRENT_SCHEMA_VERSION,
            "database schema is newer than this binary"
        );
        return Ok(());
    }

    let pending = MIGRATIONS.iter().enumerate().skip(version.saturating_sub(1) as usize);
    for (i, migrate) in pending {
        let next = i as u32 + 2;
        tracing::info!(from = next - 1, to = next, "running migration");

        let tx = conn.unchecked_transaction()?;
        migrate(&tx)?;
        update_schema_version(&tx, next)?;
        tx.commit()?;
    }

    Ok(())
}
