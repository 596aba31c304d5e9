//! Capability trait definitions
//!
//! External services are opaque capabilities behind these seams; the engine
//! never assumes a concrete backend.

use crate::error::RoundtableResult;
use crate::types::{Checkpoint, SearchDocument};
use async_trait::async_trait;
use serde_json::Value;

/// Text-generation capability
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Free-text generation
    async fn generate(&self, prompt: &str) -> RoundtableResult<String>;

    /// Structured generation constrained by a JSON schema
    ///
    /// The returned value conforms to `schema`; a non-conforming backend
    /// response surfaces as `InvalidSchema`.
    async fn generate_structured(&self, prompt: &str, schema: &Value) -> RoundtableResult<Value>;
}

/// Search provider capability
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable provider name used for provenance tags and logs
    fn name(&self) -> &str;

    /// Ranked documents for a query; an empty result list is not an error
    async fn search(&self, query: &str) -> RoundtableResult<Vec<SearchDocument>>;
}

/// Durable, keyed storage of workflow state snapshots
///
/// Generic over the state tree to keep this crate independent of the
/// engine's run model. Writes must be atomic per run: a reader never
/// observes a torn snapshot.
#[async_trait]
pub trait CheckpointStore<S>: Send + Sync {
    /// Persist a snapshot, replacing any previous one for this run
    async fn save(&self, run_id: &str, checkpoint: &Checkpoint<S>) -> RoundtableResult<()>;

    /// Load the latest snapshot; unknown run ids fail with `NotFound`
    async fn load(&self, run_id: &str) -> RoundtableResult<Checkpoint<S>>;

    /// Remove a run's snapshot
    async fn delete(&self, run_id: &str) -> RoundtableResult<()>;

    /// List run ids with a stored snapshot
    async fn list_runs(&self) -> RoundtableResult<Vec<String>>;
}
