//! One classification pass over newly seen messages.
//!
//! A run moves through `Connecting → Selecting → Embedding → Scoring →
//! Writing → Closed`, or ends in `Failed` from any stage before `Closed`.
//! Embeddings are persisted at the end of the `Embedding` stage because the
//! scoring queries read them back from the store; a failure in a later stage
//! leaves them committed. Nothing is retried: the next scheduled run selects
//! the still-unprocessed messages again.

pub mod score;
pub mod select;
pub mod types;
pub mod write;

pub use score::ScoringStrategy;

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{PipelineConfig, MAX_BATCH_TEXTS};
use crate::db::{self, StoreSession};
use crate::embedding::EmbeddingProvider;
use crate::error::PipelineError;
use types::CandidateMessage;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Connecting,
    Selecting,
    Embedding,
    Scoring,
    Writing,
    Closed,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Selecting => "selecting",
            Self::Embedding => "embedding",
            Self::Scoring => "scoring",
            Self::Writing => "writing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Last stage that executed: `Selecting` when nothing was eligible,
    /// `Writing` for a full pass.
    pub completed_stage: Stage,
    pub selected: usize,
    pub embeddings_written: usize,
    pub embeddings_skipped: usize,
    pub categories: usize,
    pub scores_written: usize,
    pub scores_dropped: usize,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            completed_stage: Stage::Idle,
            selected: 0,
            embeddings_written: 0,
            embeddings_skipped: 0,
            categories: 0,
            scores_written: 0,
            scores_dropped: 0,
        }
    }
}

pub struct Pipeline {
    provider: Arc<dyn EmbeddingProvider>,
    settings: PipelineConfig,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, settings: PipelineConfig) -> Self {
        Self { provider, settings }
    }

    /// Open the store at `db_path`, run one pass, and close the store on
    /// every exit path.
    pub async fn run(&self, db_path: &Path) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::now_v7();
        let span = tracing::info_span!("pipeline_run", %run_id);

        async move {
            tracing::debug!(stage = %Stage::Connecting, "stage started");
            let mut session = match StoreSession::open(db_path) {
                Ok(session) => session,
                Err(e) => {
                    let err = PipelineError::Connection {
                        reason: format!("{e:#}"),
                    };
                    tracing::error!(
                        stage = %Stage::Connecting,
                        kind = err.kind(),
                        error = %err,
                        "pipeline stage failed"
                    );
                    return Err(err);
                }
            };

            let result = self.execute(session.connection(), run_id).await;

            if let Err(e) = session.close() {
                let reason = format!("{e:#}");
                tracing::error!(kind = "ConnectionError", error = %reason, "store close failed");
            }
            tracing::debug!(stage = %Stage::Closed, "store released");
            result
        }
        .instrument(span)
        .await
    }

    /// Run one pass on a caller-owned connection. The caller is responsible
    /// for closing it.
    pub async fn run_on(&self, conn: &mut Connection) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::now_v7();
        self.execute(conn, run_id)
            .instrument(tracing::info_span!("pipeline_run", %run_id))
            .await
    }

    async fn execute(&self, conn: &mut Connection, run_id: Uuid) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::new(run_id);
        let mut stage = Stage::Idle;

        let result = self.stages(conn, &mut report, &mut stage).await;
        match result {
            Ok(()) => {
                tracing::info!(
                    completed_stage = %report.completed_stage,
                    selected = report.selected,
                    embeddings_written = report.embeddings_written,
                    categories = report.categories,
                    scores_written = report.scores_written,
                    "pipeline run finished"
                );
                Ok(report)
            }
            Err(err) => {
                tracing::error!(
                    stage = %stage,
                    kind = err.kind(),
                    selected = report.selected,
                    embeddings_written = report.embeddings_written,
                    categories = report.categories,
                    error = %err,
                    "pipeline stage failed"
                );
                tracing::debug!(stage = %Stage::Failed, "run aborted");
                Err(err)
            }
        }
    }

    async fn stages(
        &self,
        conn: &mut Connection,
        report: &mut RunReport,
        stage: &mut Stage,
    ) -> Result<(), PipelineError> {
        enter(stage, report, Stage::Selecting);
        let candidates = select::select_candidates(
            conn,
            Utc::now(),
            Duration::hours(self.settings.recency_hours),
            self.settings.effective_batch_limit(),
        )
        .map_err(PipelineError::query(Stage::Selecting))?;
        report.selected = candidates.len();

        if candidates.is_empty() {
            tracing::info!("no eligible messages");
            return Ok(());
        }

        enter(stage, report, Stage::Embedding);
        let embeddings = self.embed(&candidates).await?;
        let written = write::write_embeddings(conn, &embeddings)
            .map_err(PipelineError::query(Stage::Embedding))?;
        report.embeddings_written = written.written;
        report.embeddings_skipped = written.skipped.len();
        if !written.skipped.is_empty() {
            let violation = PipelineError::DataIntegrity {
                reason: format!(
                    "{} message(s) already had an embedding",
                    written.skipped.len()
                ),
            };
            tracing::warn!(kind = violation.kind(), skipped = ?written.skipped, "{violation}");
        }
        self.record_model(conn)
            .map_err(PipelineError::query(Stage::Embedding))?;

        enter(stage, report, Stage::Scoring);
        let categories =
            score::list_categories(conn).map_err(PipelineError::query(Stage::Scoring))?;
        report.categories = categories.len();
        if categories.is_empty() {
            tracing::warn!("no reference categories with embeddings; nothing to score");
        }
        let ids: Vec<i64> = candidates.iter().map(|m| m.id).collect();
        let scores = score::score_batch(conn, &ids, &categories, self.settings.strategy)
            .map_err(PipelineError::query(Stage::Scoring))?;
        for row in &scores {
            tracing::trace!(
                message_id = row.message_id,
                topic = %row.topic,
                industry = %row.industry,
                reference_id = row.reference_id,
                similarity = row.similarity,
                "best match"
            );
        }

        enter(stage, report, Stage::Writing);
        let outcome = write::upsert_scores(conn, &scores)
            .map_err(PipelineError::query(Stage::Writing))?;
        report.scores_written = outcome.written;
        report.scores_dropped = outcome.dropped;
        if outcome.dropped > 0 {
            let violation = PipelineError::DataIntegrity {
                reason: format!("{} score(s) referenced missing messages", outcome.dropped),
            };
            tracing::warn!(kind = violation.kind(), "{violation}");
        }

        Ok(())
    }

    /// Call the embedding capability once for the whole batch and pair each
    /// vector with its message id by position.
    async fn embed(
        &self,
        candidates: &[CandidateMessage],
    ) -> Result<Vec<(i64, Vec<f32>)>, PipelineError> {
        if candidates.len() > MAX_BATCH_TEXTS || candidates.iter().any(|m| m.content.is_empty()) {
            return Err(PipelineError::EmbeddingService {
                reason: format!(
                    "refusing to send batch of {} texts (max {MAX_BATCH_TEXTS}, no empty strings)",
                    candidates.len()
                ),
            });
        }

        let texts: Vec<String> = candidates.iter().map(|m| m.content.clone()).collect();
        let provider = Arc::clone(&self.provider);
        let vectors = tokio::task::spawn_blocking(move || {
            let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
            provider.embed_batch(&text_refs)
        })
        .await
        .map_err(|e| PipelineError::EmbeddingService {
            reason: format!("embedding task failed: {e}"),
        })?
        .map_err(|e| PipelineError::EmbeddingService {
            reason: format!("{e:#}"),
        })?;

        if vectors.len() != candidates.len() {
            return Err(PipelineError::EmbeddingService {
                reason: format!(
                    "expected {} embeddings, got {}",
                    candidates.len(),
                    vectors.len()
                ),
            });
        }
        let dim = self.provider.dimensions();
        if let Some(bad) = vectors.iter().position(|v| v.len() != dim) {
            return Err(PipelineError::EmbeddingService {
                reason: format!(
                    "embedding at position {bad} has {} dimensions, expected {dim}",
                    vectors[bad].len()
                ),
            });
        }

        let degenerate: Vec<i64> = candidates
            .iter()
            .zip(&vectors)
            .filter(|(_, v)| v.iter().all(|x| *x == 0.0))
            .map(|(m, _)| m.id)
            .collect();
        if !degenerate.is_empty() {
            tracing::warn!(
                message_ids = ?degenerate,
                "zero-norm embeddings have no cosine similarity; these messages will not be scored"
            );
        }

        Ok(candidates.iter().map(|m| m.id).zip(vectors).collect())
    }

    /// Record the model on first use; warn when it no longer matches.
    fn record_model(&self, conn: &Connection) -> rusqlite::Result<()> {
        let configured = self.provider.model_name();
        match db::migrations::get_embedding_model(conn)? {
            None => db::migrations::set_embedding_model(conn, configured)?,
            Some(stored) if stored != configured => {
                tracing::warn!(
                    stored = %stored,
                    configured = %configured,
                    "embedding model changed; new vectors are not comparable with older ones"
                );
            }
            Some(_) => {}
        }
        Ok(())
    }
}

fn enter(stage: &mut Stage, report: &mut RunReport, next: Stage) {
    tracing::debug!(from = %stage, to = %next, "stage transition");
    *stage = next;
    report.completed_stage = next;
}
