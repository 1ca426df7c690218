use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::pipeline::ScoringStrategy;

/// Hard cap on texts per embedding request and messages per run.
pub const MAX_BATCH_TEXTS: usize = 100;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FeedsiftConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    /// Name of the environment variable holding the bearer token, if any.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_limit: usize,
    pub recency_hours: i64,
    pub strategy: ScoringStrategy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_feedsift_dir()
            .join("feedsift.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "http".into(),
            endpoint: "http://localhost:8080".into(),
            model: "bge-base-en-v1.5".into(),
            dimensions: 768,
            api_key_env: None,
            timeout_secs: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_limit: MAX_BATCH_TEXTS,
            recency_hours: 24,
            strategy: ScoringStrategy::Window,
        }
    }
}

impl PipelineConfig {
    /// Effective batch size: never zero, never above [`MAX_BATCH_TEXTS`].
    pub fn effective_batch_limit(&self) -> usize {
        self.batch_limit.clamp(1, MAX_BATCH_TEXTS)
    }
}

/// Returns `~/.feedsift/`
pub fn default_feedsift_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".feedsift")
}

/// Returns the default config file path: `~/.feedsift/config.toml`
pub fn default_config_path() -> PathBuf {
    default_feedsift_dir().join("config.toml")
}

impl FeedsiftConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            FeedsiftConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (FEEDSIFT_DB, FEEDSIFT_LOG_LEVEL,
    /// FEEDSIFT_EMBEDDING_ENDPOINT, FEEDSIFT_EMBEDDING_MODEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FEEDSIFT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("FEEDSIFT_LOG_LEVEL") {
            self.log.level = val;
        }
        if let Ok(val) = std::env::var("FEEDSIFT_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = val;
        }
        if let Ok(val) = std::env::var("FEEDSIFT_EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        let config = FeedsiftConfig::default();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.embedding.provider, "http");
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.pipeline.batch_limit, 100);
        assert_eq!(config.pipeline.recency_hours, 24);
        assert_eq!(config.pipeline.strategy, ScoringStrategy::Window);
        assert!(config.storage.db_path.ends_with("feedsift.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[log]
level = "debug"

[storage]
db_path = "/tmp/test.db"

[embedding]
endpoint = "http://embed.internal:9000"
dimensions = 1024
api_key_env = "EMBED_TOKEN"

[pipeline]
strategy = "per_category"
"#;
        let config: FeedsiftConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.embedding.endpoint, "http://embed.internal:9000");
        assert_eq!(config.embedding.dimensions, 1024);
        assert_eq!(config.embedding.api_key_env.as_deref(), Some("EMBED_TOKEN"));
        assert_eq!(config.pipeline.strategy, ScoringStrategy::PerCategory);
        // defaults still apply for unset fields
        assert_eq!(config.embedding.timeout_secs, 30);
        assert_eq!(config.pipeline.recency_hours, 24);
    }

    #[test]
    fn batch_limit_is_clamped() {
        let mut pipeline = PipelineConfig::default();
        pipeline.batch_limit = 500;
        assert_eq!(pipeline.effective_batch_limit(), MAX_BATCH_TEXTS);
        pipeline.batch_limit = 0;
        assert_eq!(pipeline.effective_batch_limit(), 1);
        pipeline.batch_limit = 40;
        assert_eq!(pipeline.effective_batch_limit(), 40);
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        let mut config = FeedsiftConfig::default();
        std::env::set_var("FEEDSIFT_DB", "/tmp/override.db");
        std::env::set_var("FEEDSIFT_LOG_LEVEL", "trace");
        std::env::set_var("FEEDSIFT_EMBEDDING_ENDPOINT", "http://other:1234");
        std::env::set_var("FEEDSIFT_EMBEDDING_MODEL", "bge-large-en-v1.5");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.log.level, "trace");
        assert_eq!(config.embedding.endpoint, "http://other:1234");
        assert_eq!(config.embedding.model, "bge-large-en-v1.5");

        // Clean up
        std::env::remove_var("FEEDSIFT_DB");
        std::env::remove_var("FEEDSIFT_LOG_LEVEL");
        std::env::remove_var("FEEDSIFT_EMBEDDING_ENDPOINT");
        std::env::remove_var("FEEDSIFT_EMBEDDING_MODEL");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = FeedsiftConfig::load_from(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.pipeline.batch_limit, MAX_BATCH_TEXTS);
    }
}
