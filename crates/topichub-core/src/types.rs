//! Domain types shared by the mutation engine, the session layer and the HTTP surface.
//!
//! Wire names are camelCase. `Topic::document_count` and the centroid fields are
//! derived values: [`ClusteringResult::normalize`] recomputes them from the
//! member documents and is the only place that writes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Error;

pub type TopicId = i64;
pub type JobId = String;

/// Cluster id of documents not confidently assigned to any topic.
pub const NOISE_CLUSTER_ID: TopicId = -1;
pub const MAX_SAMPLE_TEXTS: usize = 5;
pub const MAX_KEYWORDS: usize = 7;

const CENTROID_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub text: String,
    pub cluster_id: TopicId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub excluded: bool,
}

impl Document {
    pub fn is_noise(&self) -> bool {
        self.cluster_id == NOISE_CLUSTER_ID
    }
}

/// A named group of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: TopicId,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub document_count: usize,
    #[serde(default)]
    pub sample_texts: Vec<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub centroid_x: f64,
    #[serde(default)]
    pub centroid_y: f64,
    #[serde(default)]
    pub coherence_score: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Merge,
    Split,
    Rename,
    Reclassify,
}

impl SuggestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionKind::Merge => "merge",
            SuggestionKind::Split => "split",
            SuggestionKind::Rename => "rename",
            SuggestionKind::Reclassify => "reclassify",
        }
    }
}

fn default_subclusters() -> usize {
    2
}

fn default_reclassify_clusters() -> usize {
    1
}

/// The edit a suggestion proposes, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SuggestionAction {
    Merge {
        target_cluster_ids: Vec<TopicId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested_label: Option<String>,
    },
    Split {
        target_cluster_ids: Vec<TopicId>,
        #[serde(default = "default_subclusters")]
        num_subclusters: usize,
    },
    Rename {
        target_cluster_ids: Vec<TopicId>,
        suggested_label: String,
    },
    Reclassify {
        target_cluster_ids: Vec<TopicId>,
        #[serde(default = "default_reclassify_clusters")]
        num_clusters: usize,
    },
}

impl SuggestionAction {
    pub fn kind(&self) -> SuggestionKind {
        match self {
            SuggestionAction::Merge { .. } => SuggestionKind::Merge,
            SuggestionAction::Split { .. } => SuggestionKind::Split,
            SuggestionAction::Rename { .. } => SuggestionKind::Rename,
            SuggestionAction::Reclassify { .. } => SuggestionKind::Reclassify,
        }
    }

    pub fn target_cluster_ids(&self) -> &[TopicId] {
        match self {
            SuggestionAction::Merge { target_cluster_ids, .. }
            | SuggestionAction::Split { target_cluster_ids, .. }
            | SuggestionAction::Rename { target_cluster_ids, .. }
            | SuggestionAction::Reclassify { target_cluster_ids, .. } => target_cluster_ids,
        }
    }
}

/// Dedup identity of a suggestion: its type plus the sorted target ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SuggestionKey {
    pub kind: SuggestionKind,
    pub targets: Vec<TopicId>,
}

impl SuggestionKey {
    pub fn new(kind: SuggestionKind, targets: &[TopicId]) -> Self {
        let sorted: BTreeSet<TopicId> = targets.iter().copied().collect();
        Self { kind, targets: sorted.into_iter().collect() }
    }
}

impl fmt::Display for SuggestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.targets.iter().map(ToString::to_string).collect();
        write!(f, "{}:{}", self.kind.as_str(), ids.join(","))
    }
}

/// A machine-generated improvement proposal.
///
/// `id` is the display form of the dedup key and is assigned on construction.
/// Once `applied` is set the record is never modified again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub action: SuggestionAction,
    #[serde(default)]
    pub description: String,
    pub confidence: f64,
    #[serde(default)]
    pub applied: bool,
    #[serde(default)]
    pub blocked: bool,
}

impl Suggestion {
    pub fn new(action: SuggestionAction, description: impl Into<String>, confidence: f64) -> Self {
        let id = SuggestionKey::new(action.kind(), action.target_cluster_ids()).to_string();
        Self {
            id,
            action,
            description: description.into(),
            confidence: confidence.clamp(0.0, 1.0),
            applied: false,
            blocked: false,
        }
    }

    pub fn kind(&self) -> SuggestionKind {
        self.action.kind()
    }

    pub fn target_cluster_ids(&self) -> &[TopicId] {
        self.action.target_cluster_ids()
    }

    pub fn key(&self) -> SuggestionKey {
        SuggestionKey::new(self.kind(), self.target_cluster_ids())
    }

    pub fn is_pending(&self) -> bool {
        !self.applied && !self.blocked
    }

    pub fn targets_intersect(&self, ids: &[TopicId]) -> bool {
        self.target_cluster_ids().iter().any(|id| ids.contains(id))
    }
}

/// A complete clustering outcome: documents partitioned into topics plus noise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringResult {
    pub documents: Vec<Document>,
    pub topics: Vec<Topic>,
    #[serde(default, alias = "llmSuggestions")]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub total_documents: usize,
    #[serde(default)]
    pub noise: usize,
    #[serde(default)]
    pub job_id: Option<String>,
    /// Opaque pipeline metadata from the compute collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl ClusteringResult {
    pub fn topic(&self, id: TopicId) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    pub fn has_topic(&self, id: TopicId) -> bool {
        self.topic(id).is_some()
    }

    pub fn members(&self, id: TopicId) -> impl Iterator<Item = &Document> + '_ {
        self.documents.iter().filter(move |d| d.cluster_id == id)
    }

    pub fn member_count(&self, id: TopicId) -> usize {
        self.members(id).count()
    }

    pub fn max_topic_id(&self) -> Option<TopicId> {
        self.topics.iter().map(|t| t.id).max()
    }

    /// Recomputes every derived field from the documents.
    ///
    /// Topics left without members are pruned; topics are ordered by id.
    pub fn normalize(&mut self) {
        let mut sums: HashMap<TopicId, (usize, f64, f64)> = HashMap::new();
        for doc in &self.documents {
            let entry = sums.entry(doc.cluster_id).or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += doc.x;
            entry.2 += doc.y;
        }
        self.topics.retain(|t| sums.get(&t.id).is_some_and(|(n, _, _)| *n > 0));
        for topic in &mut self.topics {
            if let Some((n, sx, sy)) = sums.get(&topic.id) {
                topic.document_count = *n;
                topic.centroid_x = sx / *n as f64;
                topic.centroid_y = sy / *n as f64;
            }
        }
        self.topics.sort_by_key(|t| t.id);
        self.noise = sums.get(&NOISE_CLUSTER_ID).map_or(0, |(n, _, _)| *n);
        self.total_documents = self.documents.len();
    }

    /// Checks the partition invariants; the error names the first violation.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.total_documents != self.documents.len() {
            return Err(format!(
                "totalDocuments {} != {} documents",
                self.total_documents,
                self.documents.len()
            ));
        }
        let mut topic_ids = HashSet::new();
        for topic in &self.topics {
            if topic.id == NOISE_CLUSTER_ID {
                return Err("topic uses the noise id".to_string());
            }
            if !topic_ids.insert(topic.id) {
                return Err(format!("duplicate topic id {}", topic.id));
            }
            if topic.keywords.len() > MAX_KEYWORDS || topic.sample_texts.len() > MAX_SAMPLE_TEXTS {
                return Err(format!("topic {} exceeds keyword/sample caps", topic.id));
            }
            if !(0.0..=1.0).contains(&topic.coherence_score) {
                return Err(format!("topic {} coherence {} out of range", topic.id, topic.coherence_score));
            }
        }
        let mut doc_ids = HashSet::new();
        let mut noise = 0usize;
        for doc in &self.documents {
            if !doc_ids.insert(doc.id.as_str()) {
                return Err(format!("duplicate document id {}", doc.id));
            }
            if doc.is_noise() {
                noise += 1;
            } else if !topic_ids.contains(&doc.cluster_id) {
                return Err(format!("document {} references missing topic {}", doc.id, doc.cluster_id));
            }
        }
        if noise != self.noise {
            return Err(format!("noise {} != {} noise documents", self.noise, noise));
        }
        for topic in &self.topics {
            let members: Vec<&Document> = self.members(topic.id).collect();
            if members.len() != topic.document_count {
                return Err(format!(
                    "topic {} documentCount {} != {} members",
                    topic.id,
                    topic.document_count,
                    members.len()
                ));
            }
            if let Some((cx, cy)) = centroid(members.iter().copied()) {
                if !approx_eq(cx, topic.centroid_x) || !approx_eq(cy, topic.centroid_y) {
                    return Err(format!("topic {} centroid is stale", topic.id));
                }
            }
        }
        Ok(())
    }
}

/// Arithmetic mean of document positions, `None` for an empty set.
pub fn centroid<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Option<(f64, f64)> {
    let (n, sx, sy) = docs
        .into_iter()
        .fold((0usize, 0.0, 0.0), |(n, sx, sy), d| (n + 1, sx + d.x, sy + d.y));
    if n == 0 {
        None
    } else {
        Some((sx / n as f64, sy / n as f64))
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= CENTROID_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Embedding,
    Reducing,
    Clustering,
    Labeling,
    Completed,
    Failed,
    Interrupted,
}

impl JobStatus {
    /// Active states in their only allowed forward order.
    pub const PIPELINE: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Embedding,
        JobStatus::Reducing,
        JobStatus::Clustering,
        JobStatus::Labeling,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Interrupted)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Resubmission (a new run) is only offered for these terminal states.
    pub fn is_resumable(self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Interrupted)
    }

    pub fn stage_index(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|s| *s == self)
    }

    /// The state following this one on the success path.
    pub fn next(self) -> Option<JobStatus> {
        match self {
            JobStatus::Labeling => Some(JobStatus::Completed),
            other => other.stage_index().and_then(|i| Self::PIPELINE.get(i + 1).copied()),
        }
    }

    pub fn can_transition_to(self, to: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(to, JobStatus::Failed | JobStatus::Interrupted) || self.next() == Some(to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Embedding => "embedding",
            JobStatus::Reducing => "reducing",
            JobStatus::Clustering => "clustering",
            JobStatus::Labeling => "labeling",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Interrupted => "interrupted",
        }
    }

    pub fn step_description(self) -> &'static str {
        match self {
            JobStatus::Queued => "Waiting in queue",
            JobStatus::Embedding => "Encoding texts",
            JobStatus::Reducing => "Reducing dimensions",
            JobStatus::Clustering => "Clustering documents",
            JobStatus::Labeling => "Labeling topics",
            JobStatus::Completed => "Done",
            JobStatus::Failed => "Failed",
            JobStatus::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Low,
    Medium,
    High,
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Granularity::Low),
            "medium" => Ok(Granularity::Medium),
            "high" => Ok(Granularity::High),
            _ => Err(Error::InvalidGranularity(s.to_string())),
        }
    }
}

fn default_granularity() -> String {
    "medium".to_string()
}

fn default_algorithm() -> String {
    "hdbscan".to_string()
}

fn default_dim_reduction() -> String {
    "umap".to_string()
}

fn default_min_cluster_size() -> usize {
    5
}

/// Parameters forwarded to the compute collaborator.
///
/// `granularity` stays a string so an unknown value reaches validation and
/// is reported as `INVALID_GRANULARITY` instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringConfig {
    #[serde(default = "default_granularity")]
    pub granularity: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_dim_reduction")]
    pub dim_reduction: String,
    #[serde(default)]
    pub num_clusters: Option<usize>,
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_job_id: Option<String>,
    #[serde(default)]
    pub iteration: u32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            granularity: default_granularity(),
            algorithm: default_algorithm(),
            dim_reduction: default_dim_reduction(),
            num_clusters: None,
            min_cluster_size: default_min_cluster_size(),
            cached_job_id: None,
            iteration: 0,
        }
    }
}

impl ClusteringConfig {
    pub fn granularity(&self) -> crate::error::Result<Granularity> {
        self.granularity.parse()
    }
}

/// One clustering job and, once completed, its current result.
///
/// `version` increases by one on every stored write; repositories reject a
/// write whose version no longer matches the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    #[serde(default)]
    pub current_step: String,
    pub text_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_count: Option<usize>,
    pub config: ClusteringConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Arc<ClusteringResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub run: u32,
    #[serde(default)]
    pub version: u64,
    #[serde(skip)]
    pub texts: Arc<Vec<String>>,
}

impl Session {
    pub fn new(job_id: impl Into<JobId>, texts: Vec<String>, config: ClusteringConfig, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            progress: 0.0,
            current_step: JobStatus::Queued.step_description().to_string(),
            text_count: texts.len(),
            topic_count: None,
            config,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            run: 1,
            version: 0,
            texts: Arc::new(texts),
        }
    }

    /// A non-terminal session whose last write is older than `timeout`.
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.status.is_active() && now.signed_duration_since(self.updated_at) > timeout
    }
}

/// A timestamped snapshot of a result, stored LIFO per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
    pub result: Arc<ClusteringResult>,
}
