#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use topichub_core::config::Settings;
use topichub_core::traits::{AuditLog, ComputeBackend, RefineContext, SuggestionAnalyzer};
use topichub_core::types::{
    ClusteringConfig, ClusteringResult, Document, Session, Suggestion, Topic, TopicId, NOISE_CLUSTER_ID,
};
use topichub_session::{InMemoryCheckpointStore, InMemorySessionRepository, JobTracker, SessionService};

pub fn fast_settings() -> Settings {
    let mut s = Settings::default();
    s.stages_ms.queued = 5;
    s.stages_ms.embedding = 20;
    s.stages_ms.reducing = 15;
    s.stages_ms.clustering = 15;
    s.stages_ms.labeling = 20;
    s.session.heartbeat_ms = 5;
    s
}

pub fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("customer message number {i}")).collect()
}

/// Three topics over the submitted texts by index; every seventh text is noise.
pub fn result_for(texts: &[String]) -> ClusteringResult {
    let documents = texts
        .iter()
        .enumerate()
        .map(|(i, t)| Document {
            id: format!("doc-{i}"),
            text: t.clone(),
            cluster_id: if i % 7 == 6 { NOISE_CLUSTER_ID } else { (i % 3) as TopicId },
            x: i as f64,
            y: (i % 3) as f64,
            excluded: false,
        })
        .collect();
    let topics = (0..3)
        .map(|id| Topic {
            id,
            label: format!("Topic {id}"),
            description: String::new(),
            document_count: 0,
            sample_texts: vec![],
            color: topichub_mutation::PALETTE[id as usize].to_string(),
            centroid_x: 0.0,
            centroid_y: 0.0,
            coherence_score: 0.4 + 0.2 * id as f64,
            keywords: vec![format!("kw{id}a"), format!("kw{id}b")],
        })
        .collect();
    ClusteringResult { documents, topics, ..Default::default() }
}

pub enum Behavior {
    Succeed,
    Fail(&'static str),
    Slow(Duration),
}

pub struct StubCompute {
    pub behavior: Behavior,
    pub calls: AtomicUsize,
}

impl StubCompute {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self { behavior, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl ComputeBackend for StubCompute {
    fn name(&self) -> &str {
        "stub"
    }

    async fn compute(&self, texts: &[String], _config: &ClusteringConfig) -> anyhow::Result<ClusteringResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed => Ok(result_for(texts)),
            Behavior::Fail(msg) => Err(anyhow::anyhow!("{msg}")),
            Behavior::Slow(d) => {
                tokio::time::sleep(*d).await;
                Ok(result_for(texts))
            }
        }
    }
}

/// Returns the same proposals on every pass.
pub struct ScriptedAnalyzer {
    pub proposals: Vec<Suggestion>,
    pub seen_on_last_call: parking_lot::Mutex<usize>,
}

impl ScriptedAnalyzer {
    pub fn new(proposals: Vec<Suggestion>) -> Arc<Self> {
        Arc::new(Self { proposals, seen_on_last_call: parking_lot::Mutex::new(0) })
    }
}

#[async_trait]
impl SuggestionAnalyzer for ScriptedAnalyzer {
    async fn propose(&self, ctx: &RefineContext) -> anyhow::Result<Vec<Suggestion>> {
        *self.seen_on_last_call.lock() = ctx.seen.len();
        Ok(self.proposals.iter().filter(|p| !ctx.seen.contains(&p.key())).cloned().collect())
    }
}

pub struct FailingAnalyzer;

#[async_trait]
impl SuggestionAnalyzer for FailingAnalyzer {
    async fn propose(&self, _ctx: &RefineContext) -> anyhow::Result<Vec<Suggestion>> {
        anyhow::bail!("model endpoint unreachable")
    }
}

pub struct FailingAudit;

#[async_trait]
impl AuditLog for FailingAudit {
    async fn record_rename(&self, _job_id: &str, _topic_id: TopicId, _old: &str, _new: &str) -> anyhow::Result<()> {
        anyhow::bail!("audit store offline")
    }
}

pub fn tracker(settings: Settings, compute: Arc<StubCompute>) -> (JobTracker, Arc<InMemorySessionRepository>) {
    let repo = Arc::new(InMemorySessionRepository::new(&settings.session));
    (JobTracker::new(Arc::new(settings), repo.clone(), compute), repo)
}

pub fn service(settings: Settings) -> SessionService {
    let repo = Arc::new(InMemorySessionRepository::new(&settings.session));
    let depth = settings.checkpoints.max_depth;
    SessionService::new(Arc::new(settings), repo, StubCompute::new(Behavior::Succeed))
        .with_checkpoints(Arc::new(InMemoryCheckpointStore::new(depth)))
}

pub async fn wait_terminal(tracker: &JobTracker, job_id: &str) -> Session {
    for _ in 0..500 {
        let s = tracker.status(job_id).await.expect("status");
        if s.status.is_terminal() {
            return s;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}

/// Submits 21 texts and waits for completion; returns the job id.
pub async fn completed_job(service: &SessionService) -> String {
    let session = service.submit(texts(21), ClusteringConfig::default()).await.expect("submit");
    let done = wait_terminal(service.tracker(), &session.job_id).await;
    assert_eq!(done.status, topichub_core::types::JobStatus::Completed, "error: {:?}", done.error);
    session.job_id
}
