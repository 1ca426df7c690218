#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{Duration, Utc};
use feedsift::db;
use feedsift::db::embedding_to_bytes;
use feedsift::embedding::EmbeddingProvider;
use rusqlite::{params, Connection};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Insert a message without an embedding.
pub fn insert_message(conn: &Connection, id: i64, content: &str) {
    conn.execute(
        "INSERT INTO messages (id, content) VALUES (?1, ?2)",
        params![id, content],
    )
    .unwrap();
}

/// Record a sighting of `message_id` that happened `hours_ago` hours ago.
/// `source` must be unique per timestamp.
pub fn insert_sighting(conn: &Connection, message_id: i64, hours_ago: i64, source: &str) {
    let ts = (Utc::now() - Duration::hours(hours_ago)).to_rfc3339();
    conn.execute(
        "INSERT INTO feed_sightings (timestamp, message_id, source) VALUES (?1, ?2, ?3)",
        params![ts, message_id, source],
    )
    .unwrap();
}

pub fn insert_reference(
    conn: &Connection,
    id: i64,
    topic: &str,
    industry: &str,
    embedding: &[f32],
) {
    conn.execute(
        "INSERT INTO reference_items (id, topic, industry, content, embedding) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            topic,
            industry,
            format!("synthetic {topic} example {id}"),
            embedding_to_bytes(embedding)
        ],
    )
    .unwrap();
}

pub fn read_embedding(conn: &Connection, message_id: i64) -> Option<Vec<f32>> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT embedding FROM messages WHERE id = ?1",
            [message_id],
            |row| row.get(0),
        )
        .unwrap();
    bytes.map(|b| db::bytes_to_embedding(&b))
}

/// All score rows as (message_id, topic, industry, similarity, main), sorted by key.
pub fn read_scores(conn: &Connection) -> Vec<(i64, String, String, f64, Option<f64>)> {
    conn.prepare(
        "SELECT message_id, topic, industry, similarity, main FROM classification_scores \
         ORDER BY message_id, topic, industry",
    )
    .unwrap()
    .query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    dot / (norm_a * norm_b)
}

/// Embedding provider backed by a fixed text → vector table. Records every
/// batch it receives.
pub struct StubProvider {
    vectors: HashMap<String, Vec<f32>>,
    dimensions: usize,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl StubProvider {
    pub fn new(dimensions: usize, vectors: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: vectors
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
            dimensions,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl EmbeddingProvider for StubProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls
            .lock()
            .unwrap()
            .push(texts.iter().map(|t| t.to_string()).collect());
        texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(*t)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no stub vector for text"))
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

/// Embedding provider that always fails, as an unreachable service would.
pub struct FailingProvider;

impl EmbeddingProvider for FailingProvider {
    fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding service returned HTTP 503 Service Unavailable")
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

/// Embedding provider that returns one vector fewer than requested.
pub struct ShortProvider;

impl EmbeddingProvider for ShortProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![vec![1.0, 0.0, 0.0]; texts.len().saturating_sub(1)])
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}
