//! Candidate selection.
//!
//! Distinctness is computed over message columns only. The sighting join is
//! there to apply the recency filter; projecting any sighting column would make
//! each sighting its own row and defeat the dedup.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use super::types::CandidateMessage;

const SELECT_CANDIDATES_SQL: &str = "\
    SELECT DISTINCT m.id, m.content \
    FROM messages m \
    JOIN feed_sightings s ON s.message_id = m.id \
    WHERE m.embedding IS NULL \
      AND trim(m.content) <> '' \
      AND julianday(s.timestamp) >= julianday(?1) \
    ORDER BY m.id \
    LIMIT ?2";

/// Messages with no embedding, non-empty content and at least one sighting
/// within `recency` of `now`, ordered by id, at most `limit` rows.
pub fn select_candidates(
    conn: &Connection,
    now: DateTime<Utc>,
    recency: Duration,
    limit: usize,
) -> rusqlite::Result<Vec<CandidateMessage>> {
    let cutoff = (now - recency).to_rfc3339();
    let mut stmt = conn.prepare_cached(SELECT_CANDIDATES_SQL)?;
    let rows = stmt
        .query_map(params![cutoff, limit as i64], |row| {
            Ok(CandidateMessage {
                id: row.get(0)?,
                content: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
