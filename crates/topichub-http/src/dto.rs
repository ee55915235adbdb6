//! Request and response bodies. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use topichub_core::types::{ClusteringConfig, JobStatus, Session, TopicId};
use topichub_mutation::ReclassifyRequest;

fn default_subclusters() -> usize {
    2
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub texts: Vec<String>,
    #[serde(default)]
    pub config: ClusteringConfig,
    /// Shorthand for `config.iteration`.
    #[serde(default)]
    pub iteration: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclusterRequest {
    pub job_id: String,
    #[serde(default)]
    pub config: ClusteringConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: String,
    pub status: JobStatus,
    pub text_count: usize,
    pub run: u32,
}

impl From<&Session> for JobAccepted {
    fn from(s: &Session) -> Self {
        Self { job_id: s.job_id.clone(), status: s.status, text_count: s.text_count, run: s.run }
    }
}

/// A session without its result, as listed by `GET /cluster/jobs`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub current_step: String,
    pub text_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_count: Option<usize>,
    pub config: ClusteringConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Session> for JobSummary {
    fn from(s: Session) -> Self {
        Self {
            job_id: s.job_id,
            status: s.status,
            progress: s.progress,
            current_step: s.current_step,
            text_count: s.text_count,
            topic_count: s.topic_count,
            config: s.config,
            created_at: s.created_at,
            updated_at: s.updated_at,
            error: s.error,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub job_id: String,
    pub cluster_ids: Vec<TopicId>,
    #[serde(default)]
    pub new_label: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    pub job_id: String,
    pub cluster_id: TopicId,
    #[serde(default = "default_subclusters")]
    pub num_subclusters: usize,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Either reclassify shape next to the job reference.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclassifyBody {
    pub job_id: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(flatten)]
    pub request: ReclassifyRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub job_id: String,
    pub topic_id: TopicId,
    pub new_label: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLabelsRequest {
    pub job_id: String,
    pub topic_ids: Vec<TopicId>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludeRequest {
    pub job_id: String,
    pub document_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub excluded: bool,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    pub job_id: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub job_id: String,
    pub suggestion_id: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Body of the requests that name only a job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_id: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub ok: bool,
    pub job_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub active_jobs: usize,
    pub suggestions_enabled: bool,
    pub checkpoints_enabled: bool,
}
