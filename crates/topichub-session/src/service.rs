//! Entry point used by the HTTP layer and the CLI.
//!
//! Edits to one job run one at a time under a per-job async mutex, read the
//! stored result, compute a new one off to the side and store it with a
//! version-checked replace. A caller that passes `expected_version` gets
//! `CONFLICT` instead of silently editing a result it has not seen.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use topichub_core::config::Settings;
use topichub_core::error::{Error, Result};
use topichub_core::traits::{
    AuditLog, CheckpointStore, ComputeBackend, LabelGenerator, LabelInput, SessionRepository, SuggestionAnalyzer,
};
use topichub_core::types::{ClusteringConfig, ClusteringResult, JobStatus, Session, Suggestion, TopicId};
use topichub_mutation::{
    merge_clusters, reclassify, relabel_topics, rename_topic, set_excluded, split_cluster, EditInfo, ExcludeInfo,
    LabelsInfo, MergeInfo, Mutation, ReclassifyInfo, ReclassifyRequest, RenameInfo, SplitInfo, Touches,
};

use crate::lifecycle::JobTracker;
use crate::suggestions::{self, ApplyOutcome, RefineAnalysis};

/// A stored edit: the new result, the operation's info block and the
/// session version it was stored under.
#[derive(Debug, Clone)]
pub struct Edited<I> {
    pub result: Arc<ClusteringResult>,
    pub info: I,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOutcome {
    #[serde(flatten)]
    pub info: RenameInfo,
    pub timestamp: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineOutcome {
    pub suggestions: Vec<Suggestion>,
    pub analysis: RefineAnalysis,
    pub version: u64,
}

/// Whether an edit pushes the previous result onto the undo stack.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Snapshot {
    Take,
    Skip,
}

pub struct SessionService {
    settings: Arc<Settings>,
    repo: Arc<dyn SessionRepository>,
    tracker: JobTracker,
    analyzer: Option<Arc<dyn SuggestionAnalyzer>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    audit: Option<Arc<dyn AuditLog>>,
    labeler: Option<Arc<dyn LabelGenerator>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionService {
    pub fn new(settings: Arc<Settings>, repo: Arc<dyn SessionRepository>, compute: Arc<dyn ComputeBackend>) -> Self {
        let tracker = JobTracker::new(Arc::clone(&settings), Arc::clone(&repo), compute);
        Self {
            settings,
            repo,
            tracker,
            analyzer: None,
            checkpoints: None,
            audit: None,
            labeler: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn SuggestionAnalyzer>) -> Self {
        self.tracker = self.tracker.with_analyzer(Arc::clone(&analyzer));
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_labeler(mut self, labeler: Arc<dyn LabelGenerator>) -> Self {
        self.labeler = Some(labeler);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn active_jobs(&self) -> usize {
        self.tracker.active_jobs()
    }

    pub async fn submit(&self, texts: Vec<String>, config: ClusteringConfig) -> Result<Session> {
        self.tracker.submit(texts, config).await
    }

    pub async fn recluster(&self, cached_job_id: &str, config: ClusteringConfig) -> Result<Session> {
        self.tracker.recluster(cached_job_id, config).await
    }

    pub async fn status(&self, job_id: &str) -> Result<Session> {
        self.tracker.status(job_id).await
    }

    pub async fn list(&self) -> Result<Vec<Session>> {
        self.tracker.list().await
    }

    pub async fn resubmit(&self, job_id: &str) -> Result<Session> {
        self.tracker.resubmit(job_id).await
    }

    pub async fn delete(&self, job_id: &str) -> Result<()> {
        self.tracker.delete(job_id).await?;
        self.locks.lock().remove(job_id);
        if let Some(store) = &self.checkpoints {
            if let Err(e) = store.clear(job_id).await {
                warn!(job_id, error = %e, "dropping checkpoints failed");
            }
        }
        Ok(())
    }

    /// Drops expired sessions along with their undo history and edit lock;
    /// meant for a periodic background task.
    pub async fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let purged = self.repo.purge_expired(now).await?;
        for job_id in &purged {
            self.locks.lock().remove(job_id);
            if let Some(store) = &self.checkpoints {
                if let Err(e) = store.clear(job_id).await {
                    warn!(job_id = %job_id, error = %e, "dropping checkpoints of expired job failed");
                }
            }
        }
        if !purged.is_empty() {
            info!(purged = purged.len(), "expired sessions removed");
        }
        Ok(purged.len())
    }

    /// Jobs that currently hold an edit lock entry.
    pub fn tracked_locks(&self) -> usize {
        self.locks.lock().len()
    }

    pub async fn merge(
        &self,
        job_id: &str,
        cluster_ids: &[TopicId],
        new_label: Option<&str>,
        expected_version: Option<u64>,
    ) -> Result<Edited<MergeInfo>> {
        self.edit(job_id, expected_version, "merge", Snapshot::Take, |r| {
            blocking(merge_clusters(r, cluster_ids, new_label)?)
        })
        .await
    }

    pub async fn split(
        &self,
        job_id: &str,
        cluster_id: TopicId,
        num_subclusters: usize,
        expected_version: Option<u64>,
    ) -> Result<Edited<SplitInfo>> {
        self.edit(job_id, expected_version, "split", Snapshot::Take, |r| {
            blocking(split_cluster(r, cluster_id, num_subclusters)?)
        })
        .await
    }

    pub async fn reclassify(
        &self,
        job_id: &str,
        request: &ReclassifyRequest,
        expected_version: Option<u64>,
    ) -> Result<Edited<ReclassifyInfo>> {
        self.edit(job_id, expected_version, "reclassify", Snapshot::Take, |r| blocking(reclassify(r, request)?))
            .await
    }

    /// Renames a topic. The audit log is told afterwards; its failure is
    /// logged and does not affect the rename.
    pub async fn rename(
        &self,
        job_id: &str,
        topic_id: TopicId,
        new_label: &str,
        expected_version: Option<u64>,
    ) -> Result<RenameOutcome> {
        let edited = self
            .edit(job_id, expected_version, "rename", Snapshot::Take, |r| rename_topic(r, topic_id, new_label))
            .await?;
        let info = edited.info;
        if info.old_label != info.new_label {
            if let Some(audit) = &self.audit {
                if let Err(e) = audit.record_rename(job_id, topic_id, &info.old_label, &info.new_label).await {
                    warn!(job_id, topic_id, error = %e, "audit log rejected rename; keeping the new label");
                }
            }
        }
        Ok(RenameOutcome { info, timestamp: Utc::now(), version: edited.version })
    }

    pub async fn exclude(
        &self,
        job_id: &str,
        document_ids: &[String],
        excluded: bool,
        expected_version: Option<u64>,
    ) -> Result<Edited<ExcludeInfo>> {
        self.edit(job_id, expected_version, "exclude", Snapshot::Skip, |r| set_excluded(r, document_ids, excluded))
            .await
    }

    pub async fn apply_suggestion(
        &self,
        job_id: &str,
        suggestion_id: &str,
        expected_version: Option<u64>,
    ) -> Result<Edited<EditInfo>> {
        self.edit(job_id, expected_version, "apply suggestion", Snapshot::Take, |r| {
            suggestions::apply(r, suggestion_id)
        })
        .await
    }

    pub async fn apply_all_suggestions(
        &self,
        job_id: &str,
        expected_version: Option<u64>,
    ) -> Result<Edited<Vec<ApplyOutcome>>> {
        self.edit(job_id, expected_version, "apply suggestions", Snapshot::Take, suggestions::apply_all)
            .await
    }

    pub async fn dismiss_suggestion(
        &self,
        job_id: &str,
        suggestion_id: &str,
        expected_version: Option<u64>,
    ) -> Result<Edited<()>> {
        self.edit(job_id, expected_version, "dismiss suggestion", Snapshot::Skip, |r| {
            Ok(Mutation { result: suggestions::dismiss(r, suggestion_id)?, info: () })
        })
        .await
    }

    /// Re-labels the given topics through the label generator. Ids that name
    /// no topic are ignored, but at least one must resolve. Nothing is stored
    /// when the generator fails.
    pub async fn generate_labels(
        &self,
        job_id: &str,
        topic_ids: &[TopicId],
        expected_version: Option<u64>,
    ) -> Result<Edited<LabelsInfo>> {
        if topic_ids.is_empty() {
            return Err(Error::invalid("At least one topic ID required."));
        }
        let labeler = self
            .labeler
            .as_ref()
            .ok_or_else(|| Error::LlmUnavailable("no label generator is configured".to_string()))?;

        let lock = self.lock_for(job_id);
        let _guard = lock.lock().await;
        let (session, current) = self.completed(job_id, expected_version).await?;
        let inputs: Vec<LabelInput> = current
            .topics
            .iter()
            .filter(|t| topic_ids.contains(&t.id))
            .map(|t| LabelInput {
                topic_id: t.id,
                current_label: t.label.clone(),
                document_count: t.document_count,
                coherence: t.coherence_score,
                sample_texts: t.sample_texts.clone(),
                member_texts: current.members(t.id).map(|d| d.text.clone()).collect(),
            })
            .collect();
        if inputs.is_empty() {
            return Err(Error::invalid(format!("None of the topics {topic_ids:?} exist.")));
        }

        let generated = labeler.label_topics(&inputs).await.map_err(|e| {
            warn!(job_id, error = %e, "label generator failed");
            Error::LlmUnavailable(e.to_string())
        })?;
        let wanted: Vec<_> = generated.into_iter().filter(|g| topic_ids.contains(&g.topic_id)).collect();
        if wanted.is_empty() {
            return Err(Error::LlmUnavailable("label generator returned no labels".to_string()));
        }
        let mutation = blocking(relabel_topics(&current, &wanted)?)?;
        self.commit(job_id, "generate labels", Snapshot::Take, session, current, mutation).await
    }

    /// Runs a suggestion pass and stores the new proposals.
    pub async fn refine(
        &self,
        job_id: &str,
        focus_areas: &[String],
        expected_version: Option<u64>,
    ) -> Result<RefineOutcome> {
        let analyzer = self
            .analyzer
            .as_ref()
            .filter(|a| self.settings.suggestions.enabled && a.is_available())
            .ok_or_else(|| Error::LlmUnavailable("no suggestion analyzer is configured".to_string()))?;

        let lock = self.lock_for(job_id);
        let _guard = lock.lock().await;
        let (session, current) = self.completed(job_id, expected_version).await?;
        let max = self.settings.suggestions.max_per_pass;
        let ctx = suggestions::refine_context(&current, focus_areas, max);
        let proposed = analyzer.propose(&ctx).await.map_err(|e| {
            warn!(job_id, error = %e, "suggestion analyzer failed");
            Error::LlmUnavailable(e.to_string())
        })?;
        let (next, added) = suggestions::merge_generated(&current, proposed, max);
        let analysis = suggestions::analyze(&next, focus_areas);
        let stored = self.store(session, next).await?;
        info!(job_id, added = added.len(), version = stored.version, "suggestions refreshed");
        Ok(RefineOutcome { suggestions: added, analysis, version: stored.version })
    }

    /// Restores the most recent checkpoint.
    pub async fn undo(&self, job_id: &str, expected_version: Option<u64>) -> Result<Session> {
        let store = self.checkpoint_store()?;
        let lock = self.lock_for(job_id);
        let _guard = lock.lock().await;
        let (session, _) = self.completed(job_id, expected_version).await?;
        let checkpoint = store
            .undo(job_id)
            .await
            .map_err(|e| {
                error!(job_id, error = %e, "checkpoint store failed on undo");
                Error::pipeline("undo")
            })?
            .ok_or_else(|| Error::NotAvailable(format!("No checkpoint to restore for job {job_id}.")))?;
        let restored = (*checkpoint.result).clone();
        let stored = self.store(session, restored).await?;
        info!(job_id, version = stored.version, checkpoint = %checkpoint.created_at, "checkpoint restored");
        Ok(stored)
    }

    pub async fn save_checkpoint(&self, job_id: &str) -> Result<()> {
        let store = self.checkpoint_store()?;
        let (_, current) = self.completed(job_id, None).await?;
        store.save(job_id, current).await.map_err(|e| {
            error!(job_id, error = %e, "checkpoint store failed on save");
            Error::pipeline("checkpoint")
        })
    }

    fn checkpoint_store(&self) -> Result<&Arc<dyn CheckpointStore>> {
        self.checkpoints
            .as_ref()
            .filter(|_| self.settings.checkpoints.enabled)
            .ok_or_else(|| Error::NotAvailable("Checkpoints are not configured.".to_string()))
    }

    fn lock_for(&self, job_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().entry(job_id.to_string()).or_default())
    }

    /// Loads a completed session and its result, checking the caller's version.
    async fn completed(&self, job_id: &str, expected_version: Option<u64>) -> Result<(Session, Arc<ClusteringResult>)> {
        let session = self.tracker.status(job_id).await?;
        if session.status != JobStatus::Completed {
            return Err(Error::invalid(format!(
                "Job {job_id} is {}; edits need a completed result.",
                session.status
            )));
        }
        if let Some(expected) = expected_version {
            if expected != session.version {
                return Err(Error::Conflict { job_id: job_id.to_string(), expected, found: session.version });
            }
        }
        let result = session
            .result
            .clone()
            .ok_or_else(|| Error::invalid(format!("Job {job_id} has no result.")))?;
        Ok((session, result))
    }

    async fn store(&self, mut session: Session, result: ClusteringResult) -> Result<Session> {
        session.topic_count = Some(result.topics.len());
        session.result = Some(Arc::new(result));
        session.updated_at = Utc::now();
        self.repo.replace(session).await
    }

    async fn edit<I, F>(
        &self,
        job_id: &str,
        expected_version: Option<u64>,
        op: &'static str,
        snapshot: Snapshot,
        apply: F,
    ) -> Result<Edited<I>>
    where
        F: FnOnce(&ClusteringResult) -> Result<Mutation<I>>,
    {
        let lock = self.lock_for(job_id);
        let _guard = lock.lock().await;
        let (session, current) = self.completed(job_id, expected_version).await?;
        let mutation = apply(current.as_ref())?;
        self.commit(job_id, op, snapshot, session, current, mutation).await
    }

    /// Stores a computed edit. Callers hold the job's edit lock.
    async fn commit<I>(
        &self,
        job_id: &str,
        op: &'static str,
        snapshot: Snapshot,
        session: Session,
        current: Arc<ClusteringResult>,
        mutation: Mutation<I>,
    ) -> Result<Edited<I>> {
        let Mutation { result: next, info } = mutation;
        if next == *current {
            return Ok(Edited { result: current, info, version: session.version });
        }
        if snapshot == Snapshot::Take && self.settings.checkpoints.auto_save {
            if let Ok(store) = self.checkpoint_store() {
                if let Err(e) = store.save(job_id, Arc::clone(&current)).await {
                    warn!(job_id, op, error = %e, "checkpoint before edit failed; continuing without it");
                }
            }
        }
        let stored = self.store(session, next).await?;
        info!(job_id, op, version = stored.version, "edit stored");
        let result = stored.result.unwrap_or_default();
        Ok(Edited { result, info, version: stored.version })
    }
}

/// Blocks pending suggestions that target topics a direct edit changed.
fn blocking<I: Touches>(mut m: Mutation<I>) -> Result<Mutation<I>> {
    let touched = m.info.touched_topics();
    let blocked = suggestions::block_conflicting(&mut m.result.suggestions, &touched, None);
    if blocked > 0 {
        tracing::debug!(blocked, "direct edit blocked pending suggestions");
    }
    Ok(m)
}
