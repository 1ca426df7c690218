//! Persistence of freshly computed embeddings and classification scores.

use rusqlite::{params, Connection};

use super::types::ScoreRow;
use crate::db::embedding_to_bytes;

/// Result of persisting one batch of embeddings.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EmbeddingWrite {
    pub written: usize,
    /// Messages whose embedding was already set (or which vanished) by the
    /// time of the write. Left untouched.
    pub skipped: Vec<i64>,
}

/// Result of the batched score upsert.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScoreWrite {
    pub written: usize,
    /// Tuples dropped because their message no longer exists.
    pub dropped: usize,
}

/// Store each embedding with a single-row conditional `UPDATE`, so a vector
/// is either fully written or not written at all, and an embedding that is
/// already present is never replaced.
pub fn write_embeddings(
    conn: &Connection,
    embeddings: &[(i64, Vec<f32>)],
) -> rusqlite::Result<EmbeddingWrite> {
    let mut stmt = conn.prepare_cached(
        "UPDATE messages SET embedding = ?1 WHERE id = ?2 AND embedding IS NULL",
    )?;

    let mut outcome = EmbeddingWrite::default();
    for (id, embedding) in embeddings {
        let changed = stmt.execute(params![embedding_to_bytes(embedding), id])?;
        if changed == 1 {
            outcome.written += 1;
        } else {
            outcome.skipped.push(*id);
        }
    }
    Ok(outcome)
}

/// Upsert all score tuples in one statement.
///
/// Conflict rule per key `(message_id, topic, industry)`:
/// `similarity` always takes the incoming value; `main` keeps its existing
/// value unless it is NULL, in which case it takes the incoming similarity.
/// Tuples whose message is missing are filtered out by the join rather than
/// failing the whole statement on the foreign key.
pub fn upsert_scores(conn: &Connection, scores: &[ScoreRow]) -> rusqlite::Result<ScoreWrite> {
    if scores.is_empty() {
        return Ok(ScoreWrite::default());
    }
    let payload = serde_json::to_string(scores)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let written = conn.execute(
        "INSERT INTO classification_scores (message_id, topic, industry, similarity, main) \
         SELECT s.message_id, s.topic, s.industry, s.similarity, s.similarity \
         FROM ( \
             SELECT json_extract(value, '$.message_id') AS message_id, \
                    json_extract(value, '$.topic') AS topic, \
                    json_extract(value, '$.industry') AS industry, \
                    json_extract(value, '$.similarity') AS similarity \
             FROM json_each(?1) \
         ) AS s \
         JOIN messages m ON m.id = s.message_id \
         WHERE true \
         ON CONFLICT (message_id, topic, industry) DO UPDATE SET \
             similarity = excluded.similarity, \
             main = COALESCE(classification_scores.main, excluded.similarity)",
        params![payload],
    )?;

    Ok(ScoreWrite {
        written,
        dropped: scores.len().saturating_sub(written),
    })
}
