//! Text-to-vector embedding capability.
//!
//! Provides the [`EmbeddingProvider`] trait and an HTTP implementation that
//! talks to an OpenAI-compatible `/v1/embeddings` endpoint. The provider is
//! created via [`create_provider`] from configuration.

pub mod http;

use std::sync::Arc;

use anyhow::{Context, Result};

/// Trait for embedding text into vectors.
///
/// `embed_batch` must return exactly one vector per input, in input order,
/// each of [`EmbeddingProvider::dimensions`] length. All methods are
/// synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of text strings.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier recorded alongside stored vectors.
    fn model_name(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// Currently only `"http"` is supported.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "http" => {
            let provider = http::HttpEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: http"),
    }
}

/// Create an embedding provider from async code.
///
/// The HTTP provider's blocking client waits on its own runtime thread while
/// it starts, which tokio forbids on an async worker thread.
pub async fn create_provider_async(
    config: &crate::config::EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let config = config.clone();
    let provider = tokio::task::spawn_blocking(move || create_provider(&config))
        .await
        .context("embedding provider setup task failed")??;
    Ok(Arc::from(provider))
}
