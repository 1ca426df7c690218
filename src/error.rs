use thiserror::Error;

use crate::pipeline::Stage;

/// Failure of a single pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store connection failed: {reason}")]
    Connection { reason: String },

    #[error("embedding service failed: {reason}")]
    EmbeddingService { reason: String },

    #[error("query failed during {stage}: {source}")]
    Query {
        stage: Stage,
        #[source]
        source: rusqlite::Error,
    },

    #[error("data integrity violation: {reason}")]
    DataIntegrity { reason: String },
}

impl PipelineError {
    /// Stable kind name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "ConnectionError",
            Self::EmbeddingService { .. } => "EmbeddingServiceError",
            Self::Query { .. } => "QueryError",
            Self::DataIntegrity { .. } => "DataIntegrityViolation",
        }
    }

    pub(crate) fn query(stage: Stage) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Query { stage, source }
    }
}
