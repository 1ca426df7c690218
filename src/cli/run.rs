//! CLI `run` command: execute one classification pass.

use anyhow::{Context, Result};

use crate::config::FeedsiftConfig;
use crate::embedding;
use crate::pipeline::Pipeline;

/// Run one pipeline pass against the configured store and print its summary.
pub async fn run(config: &FeedsiftConfig) -> Result<()> {
    let provider = embedding::create_provider_async(&config.embedding)
        .await
        .context("failed to create embedding provider")?;

    let pipeline = Pipeline::new(provider, config.pipeline.clone());
    let report = pipeline
        .run(&config.resolved_db_path())
        .await
        .context("pipeline run failed")?;

    println!("Run {}", report.run_id);
    println!("  Selected:            {}", report.selected);
    println!("  Embeddings written:  {}", report.embeddings_written);
    if report.embeddings_skipped > 0 {
        println!("  Embeddings skipped:  {}", report.embeddings_skipped);
    }
    println!("  Categories:          {}", report.categories);
    println!("  Scores written:      {}", report.scores_written);
    if report.scores_dropped > 0 {
        println!("  Scores dropped:      {}", report.scores_dropped);
    }
    Ok(())
}
