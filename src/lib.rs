//! Scheduled topic/industry classification of feed messages.
//!
//! Each invocation selects up to 100 recently sighted messages that have no
//! embedding yet, embeds them in a single call to an external embedding
//! service, finds the nearest pre-labelled reference item in every
//! `(topic, industry)` category, and upserts the resulting cosine similarities.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   supplying `vec_distance_cosine`; embeddings are `f32` BLOBs
//! - **Embeddings**: any OpenAI-compatible `/v1/embeddings` endpoint
//! - **Scoring**: ranked SQL joins over the whole batch, never per-pair queries
//! - **Writes**: conditional per-message embedding updates and one batched
//!   score upsert that only fills `main` when it is NULL
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, scoped sessions and health checks
//! - [`embedding`]: The embedding capability trait and its HTTP client
//! - [`pipeline`]: Selector, scorer, writer and the run orchestrator
//! - [`error`]: Pipeline error kinds

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod pipeline;
