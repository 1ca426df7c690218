//! Row types flowing between pipeline stages.

use serde::Serialize;

/// A message eligible for classification: no embedding yet, recently sighted,
/// non-empty content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMessage {
    pub id: i64,
    pub content: String,
}

/// A `(topic, industry)` pair present in `reference_items`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category {
    pub topic: String,
    pub industry: String,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.topic, self.industry)
    }
}

/// Best match of one message within one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub message_id: i64,
    pub topic: String,
    pub industry: String,
    /// Reference item that produced the score. Kept for tracing only.
    #[serde(skip)]
    pub reference_id: i64,
    /// `1 - cosine_distance` to the closest reference item.
    pub similarity: f64,
}
