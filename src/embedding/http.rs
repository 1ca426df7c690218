//! HTTP embedding provider for OpenAI-compatible `/v1/embeddings` services.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

pub fn embeddings_url(endpoint: &str) -> String {
    format!("{}/v1/embeddings", endpoint.trim_end_matches('/'))
}

/// Parse a `/v1/embeddings` response body, restoring input order from each
/// entry's `index` and checking count and dimensionality.
pub fn parse_embeddings_response(
    body: &str,
    expected_len: usize,
    expected_dim: usize,
) -> Result<Vec<Vec<f32>>> {
    let parsed: EmbeddingsResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("invalid embeddings json: {e}"))?;

    if parsed.data.len() != expected_len {
        return Err(anyhow!(
            "expected {expected_len} embeddings, got {}",
            parsed.data.len()
        ));
    }

    let mut out: Vec<Option<Vec<f32>>> = vec![None; expected_len];
    for item in parsed.data {
        if item.index >= expected_len {
            return Err(anyhow!(
                "embedding index out of range: {} (expected < {expected_len})",
                item.index
            ));
        }
        if item.embedding.len() != expected_dim {
            return Err(anyhow!(
                "embedding dim mismatch at index {}: expected {expected_dim}, got {}",
                item.index,
                item.embedding.len()
            ));
        }
        if out[item.index].replace(item.embedding).is_some() {
            return Err(anyhow!("duplicate embedding index {}", item.index));
        }
    }

    out.into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| anyhow!("missing embedding at index {i}")))
        .collect()
}

pub struct HttpEmbeddingProvider {
    client: Client,
    url: String,
    model: String,
    dimensions: usize,
    api_key: Option<String>,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let api_key = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .with_context(|| format!("embedding API key env var {var} is not set"))?,
            ),
            None => None,
        };

        let url = embeddings_url(&config.endpoint);
        tracing::info!(url = %url, model = %config.model, dimensions = config.dimensions, "HTTP embedding provider ready");

        Ok(Self {
            client,
            url,
            model: config.model.clone(),
            dimensions: config.dimensions,
            api_key,
        })
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut request = self.client.post(&self.url).json(&EmbeddingsRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .with_context(|| format!("embedding request to {} failed", self.url))?;
        let status = response.status();
        let body = response.text().context("error reading embedding response")?;
        anyhow::ensure!(
            status.is_success(),
            "embedding service returned HTTP {status}"
        );

        parse_embeddings_response(&body, texts.len(), self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
