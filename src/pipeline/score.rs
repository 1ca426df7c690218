//! Best-match similarity per (message, category), computed set-wise in SQL.
//!
//! Both strategies rank candidate pairs by `vec_distance_cosine` and keep the
//! first row of each group. Ties on distance go to the lowest reference id.
//! Categories without reference items never produce a row, and neither do
//! pairs with an undefined distance (a zero-norm vector on either side).

use rusqlite::{params, Connection};
use serde::Deserialize;

use super::types::{Category, ScoreRow};

/// How the nearest reference item per category is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// One ranked join across the whole batch and every category.
    #[default]
    Window,
    /// One ranked query per category, each covering the whole batch.
    PerCategory,
}

const LIST_CATEGORIES_SQL: &str = "\
    SELECT DISTINCT topic, industry FROM reference_items \
    WHERE embedding IS NOT NULL \
    ORDER BY topic, industry";

const SCORE_WINDOW_SQL: &str = "\
    WITH pairs AS ( \
        SELECT m.id AS message_id, r.topic AS topic, r.industry AS industry, \
               r.id AS reference_id, \
               vec_distance_cosine(m.embedding, r.embedding) AS distance \
        FROM json_each(?1) AS batch \
        JOIN messages m ON m.id = batch.value \
        JOIN reference_items r \
        WHERE m.embedding IS NOT NULL AND r.embedding IS NOT NULL \
    ), \
    ranked AS ( \
        SELECT message_id, topic, industry, reference_id, distance, \
               ROW_NUMBER() OVER ( \
                   PARTITION BY message_id, topic, industry \
                   ORDER BY distance, reference_id \
               ) AS rn \
        FROM pairs \
        WHERE distance IS NOT NULL \
    ) \
    SELECT message_id, topic, industry, reference_id, 1.0 - distance \
    FROM ranked WHERE rn = 1 \
    ORDER BY message_id, topic, industry";

const SCORE_CATEGORY_SQL: &str = "\
    WITH pairs AS ( \
        SELECT m.id AS message_id, r.id AS reference_id, \
               vec_distance_cosine(m.embedding, r.embedding) AS distance \
        FROM json_each(?1) AS batch \
        JOIN messages m ON m.id = batch.value \
        JOIN reference_items r ON r.topic = ?2 AND r.industry = ?3 \
        WHERE m.embedding IS NOT NULL AND r.embedding IS NOT NULL \
    ), \
    ranked AS ( \
        SELECT message_id, reference_id, distance, \
               ROW_NUMBER() OVER ( \
                   PARTITION BY message_id ORDER BY distance, reference_id \
               ) AS rn \
        FROM pairs \
        WHERE distance IS NOT NULL \
    ) \
    SELECT message_id, reference_id, 1.0 - distance \
    FROM ranked WHERE rn = 1 \
    ORDER BY message_id";

/// Distinct categories with at least one embedded reference item, read fresh
/// on every call.
pub fn list_categories(conn: &Connection) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare_cached(LIST_CATEGORIES_SQL)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Category {
                topic: row.get(0)?,
                industry: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Score every embedded message in `message_ids` against every category.
///
/// `categories` is only consulted by [`ScoringStrategy::PerCategory`]; the
/// window strategy discovers categories inside the join.
pub fn score_batch(
    conn: &Connection,
    message_ids: &[i64],
    categories: &[Category],
    strategy: ScoringStrategy,
) -> rusqlite::Result<Vec<ScoreRow>> {
    if message_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids_json = ids_to_json(message_ids);

    match strategy {
        ScoringStrategy::Window => score_window(conn, &ids_json),
        ScoringStrategy::PerCategory => {
            let mut rows = Vec::new();
            for category in categories {
                rows.extend(score_category(conn, &ids_json, category)?);
            }
            rows.sort_by(|a, b| {
                (a.message_id, &a.topic, &a.industry).cmp(&(b.message_id, &b.topic, &b.industry))
            });
            Ok(rows)
        }
    }
}

fn ids_to_json(ids: &[i64]) -> String {
    let joined: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    format!("[{}]", joined.join(","))
}

fn score_window(conn: &Connection, ids_json: &str) -> rusqlite::Result<Vec<ScoreRow>> {
    let mut stmt = conn.prepare_cached(SCORE_WINDOW_SQL)?;
    let rows = stmt
        .query_map(params![ids_json], |row| {
            Ok(ScoreRow {
                message_id: row.get(0)?,
                topic: row.get(1)?,
                industry: row.get(2)?,
                reference_id: row.get(3)?,
                similarity: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn score_category(
    conn: &Connection,
    ids_json: &str,
    category: &Category,
) -> rusqlite::Result<Vec<ScoreRow>> {
    let mut stmt = conn.prepare_cached(SCORE_CATEGORY_SQL)?;
    let rows = stmt
        .query_map(params![ids_json, category.topic, category.industry], |row| {
            Ok(ScoreRow {
                message_id: row.get(0)?,
                topic: category.topic.clone(),
                industry: category.industry.clone(),
                reference_id: row.get(1)?,
                similarity: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
