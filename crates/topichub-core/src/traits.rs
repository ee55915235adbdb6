use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Checkpoint, ClusteringConfig, ClusteringResult, JobId, Session, Suggestion, SuggestionKey, Topic, TopicId};

/// Keyed session storage. Every write is checked against the stored version.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Stores a fresh session. Fails with `INVALID_INPUT` if the id is taken.
    async fn insert(&self, session: Session) -> Result<Session>;

    async fn get(&self, job_id: &str) -> Result<Option<Session>>;

    /// Replaces the stored session when `session.version` still matches it,
    /// returning the stored copy with its version bumped. A mismatch is `CONFLICT`.
    async fn replace(&self, session: Session) -> Result<Session>;

    async fn delete(&self, job_id: &str) -> Result<bool>;

    async fn list(&self) -> Result<Vec<Session>>;

    /// Drops sessions past their retention window; returns the ids that went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<JobId>>;
}

/// Embedding, reduction, clustering and labeling in one call.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn compute(&self, texts: &[String], config: &ClusteringConfig) -> anyhow::Result<ClusteringResult>;
}

/// Input handed to a suggestion analyzer for one refine pass.
#[derive(Debug, Clone)]
pub struct RefineContext {
    pub topics: Vec<Topic>,
    pub total_documents: usize,
    pub noise: usize,
    pub focus_areas: Vec<String>,
    /// Keys of the pending and applied suggestions; blocked keys may be proposed again.
    pub seen: BTreeSet<SuggestionKey>,
    pub max_suggestions: usize,
}

#[async_trait]
pub trait SuggestionAnalyzer: Send + Sync {
    /// `false` means refine requests are answered with `LLM_UNAVAILABLE`.
    fn is_available(&self) -> bool {
        true
    }

    async fn propose(&self, ctx: &RefineContext) -> anyhow::Result<Vec<Suggestion>>;
}

/// One topic handed to a label generator.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelInput {
    pub topic_id: TopicId,
    pub current_label: String,
    pub document_count: usize,
    pub coherence: f64,
    pub sample_texts: Vec<String>,
    pub member_texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedLabel {
    pub topic_id: TopicId,
    pub label: String,
    pub description: String,
}

/// Names topics from their members. Topics missing from the answer keep
/// their current label.
#[async_trait]
pub trait LabelGenerator: Send + Sync {
    async fn label_topics(&self, topics: &[LabelInput]) -> anyhow::Result<Vec<GeneratedLabel>>;
}

/// LIFO snapshot storage used by undo.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, job_id: &str, result: Arc<ClusteringResult>) -> anyhow::Result<()>;

    /// Pops the most recent snapshot, if any.
    async fn undo(&self, job_id: &str) -> anyhow::Result<Option<Checkpoint>>;

    async fn depth(&self, job_id: &str) -> anyhow::Result<usize>;

    /// Drops every snapshot of a deleted job.
    async fn clear(&self, job_id: &str) -> anyhow::Result<()>;
}

/// Receives label changes. Failures are logged by the caller and never
/// undo the rename.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record_rename(&self, job_id: &str, topic_id: TopicId, old_label: &str, new_label: &str) -> anyhow::Result<()>;
}
