//! SQL DDL for all feedsift tables.
//!
//! Defines `messages`, `feed_sightings`, `reference_items`,
//! `classification_scores` and `schema_meta`. Embeddings are plain BLOB
//! columns holding little-endian `f32` vectors, which is the encoding
//! sqlite-vec's scalar functions (`vec_distance_cosine`, `vec_length`) accept.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for feedsift's core tables.
const SCHEMA_SQL: &str = r#"
-- Distinct message texts; embedding is filled in once by the pipeline
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY,
    content TEXT NOT NULL UNIQUE,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_messages_pending ON messages(id) WHERE embedding IS NULL;

-- Each observation of a message in an upstream feed
CREATE TABLE IF NOT EXISTS feed_sightings (
    id INTEGER PRIMARY KEY,
    timestamp TEXT NOT NULL,
    message_id INTEGER NOT NULL REFERENCES messages(id),
    source TEXT NOT NULL,
    source_ref TEXT,
    UNIQUE (timestamp, source)
);

CREATE INDEX IF NOT EXISTS idx_sightings_timestamp ON feed_sightings(timestamp);
CREATE INDEX IF NOT EXISTS idx_sightings_message_time ON feed_sightings(message_id, timestamp);

-- Pre-labelled anchors, populated out-of-band
CREATE TABLE IF NOT EXISTS reference_items (
    id INTEGER PRIMARY KEY,
    topic TEXT NOT NULL,
    industry TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reference_category ON reference_items(topic, industry);

-- Best-match score per (message, topic, industry)
CREATE TABLE IF NOT EXISTS classification_scores (
    id INTEGER PRIMARY KEY,
    topic TEXT NOT NULL,
    industry TEXT NOT NULL,
    main REAL,
    similarity REAL,
    message_id INTEGER NOT NULL REFERENCES messages(id),
    UNIQUE (message_id, topic, industry)
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
