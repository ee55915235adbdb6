//! Job lifecycle: submission, the staged driver and lazy abandonment checks.
//!
//! A spawned driver is the only writer of a session while it is active. It
//! walks the stages in order, writes progress on every heartbeat and runs the
//! compute call during labeling. Readers never wait on it; whoever reads a
//! session that has not been written for longer than the staleness timeout
//! marks it interrupted.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

use topichub_core::config::{Limits, Settings};
use topichub_core::data_processor::clean_texts;
use topichub_core::error::{Error, Result};
use topichub_core::traits::{ComputeBackend, SessionRepository, SuggestionAnalyzer};
use topichub_core::types::{ClusteringConfig, ClusteringResult, JobStatus, Session};

use crate::suggestions;

/// Progress never reaches 100 before the compute call has returned.
pub const PROGRESS_CAP: f64 = 99.0;

const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct JobTracker {
    repo: Arc<dyn SessionRepository>,
    compute: Arc<dyn ComputeBackend>,
    analyzer: Option<Arc<dyn SuggestionAnalyzer>>,
    settings: Arc<Settings>,
    running: Arc<Mutex<HashSet<String>>>,
}

/// Marks a job as owned by a driver for as long as it lives.
struct RunGuard {
    running: Arc<Mutex<HashSet<String>>>,
    job_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.lock().remove(&self.job_id);
    }
}

fn check_count(got: usize, limits: &Limits) -> Result<()> {
    if got < limits.min_texts {
        return Err(Error::TooFewTexts { min: limits.min_texts, got });
    }
    if got > limits.max_texts {
        return Err(Error::TooManyTexts { max: limits.max_texts, got });
    }
    Ok(())
}

impl JobTracker {
    pub fn new(settings: Arc<Settings>, repo: Arc<dyn SessionRepository>, compute: Arc<dyn ComputeBackend>) -> Self {
        Self { repo, compute, analyzer: None, settings, running: Arc::new(Mutex::new(HashSet::new())) }
    }

    /// Seeds completed results with a first suggestion pass.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn SuggestionAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.repo
    }

    /// Jobs with a live driver in this process.
    pub fn active_jobs(&self) -> usize {
        self.running.lock().len()
    }

    /// Validates and cleans `texts`, then queues a new job. An empty text
    /// list with `config.cached_job_id` set reruns the cached job's texts.
    pub async fn submit(&self, texts: Vec<String>, config: ClusteringConfig) -> Result<Session> {
        if texts.is_empty() {
            if let Some(source) = config.cached_job_id.clone() {
                return self.recluster(&source, config).await;
            }
        }
        let limits = &self.settings.limits;
        check_count(texts.len(), limits)?;
        config.granularity()?;
        let cleaned = clean_texts(&texts, limits.max_text_length);
        if cleaned.len() < limits.min_texts {
            warn!(submitted = texts.len(), kept = cleaned.len(), "too few texts left after filtering");
            return Err(Error::TooFewTexts { min: limits.min_texts, got: cleaned.len() });
        }
        self.start(cleaned, config).await
    }

    /// Starts a new job over the texts stored with `cached_job_id`.
    pub async fn recluster(&self, cached_job_id: &str, mut config: ClusteringConfig) -> Result<Session> {
        let source = self
            .repo
            .get(cached_job_id)
            .await?
            .filter(|s| !s.texts.is_empty())
            .ok_or_else(|| Error::CachedJobNotFound(cached_job_id.to_string()))?;
        config.granularity()?;
        config.cached_job_id = Some(cached_job_id.to_string());
        config.iteration = source.config.iteration + 1;
        self.start(source.texts.as_ref().clone(), config).await
    }

    async fn start(&self, texts: Vec<String>, config: ClusteringConfig) -> Result<Session> {
        let job_id = Uuid::new_v4().to_string();
        let guard = self.claim(&job_id)?;
        let session = self.repo.insert(Session::new(job_id, texts, config, Utc::now())).await?;
        info!(job_id = %session.job_id, texts = session.text_count, granularity = %session.config.granularity, "job queued");
        self.spawn_driver(session.clone(), guard);
        Ok(session)
    }

    /// Reads a session, converting it to `interrupted` if it went stale.
    pub async fn status(&self, job_id: &str) -> Result<Session> {
        let session = self
            .repo
            .get(job_id)
            .await?
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;
        self.observe(session).await
    }

    /// All sessions, newest first, with the staleness check applied.
    pub async fn list(&self) -> Result<Vec<Session>> {
        let mut out = Vec::new();
        for session in self.repo.list().await? {
            match self.observe(session).await {
                Ok(s) => out.push(s),
                Err(Error::JobNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    pub async fn delete(&self, job_id: &str) -> Result<()> {
        if self.repo.delete(job_id).await? {
            info!(job_id, "job deleted");
            Ok(())
        } else {
            Err(Error::JobNotFound(job_id.to_string()))
        }
    }

    /// Starts a new run of a failed or interrupted job under the same id.
    pub async fn resubmit(&self, job_id: &str) -> Result<Session> {
        let session = self.status(job_id).await?;
        if !session.status.is_resumable() {
            return Err(Error::invalid(format!(
                "Job {job_id} is {}; only failed or interrupted jobs can be resubmitted.",
                session.status
            )));
        }
        if session.texts.is_empty() {
            return Err(Error::invalid(format!("Job {job_id} has no stored texts to rerun.")));
        }
        let guard = self.claim(job_id)?;
        let mut next = session;
        next.status = JobStatus::Queued;
        next.progress = 0.0;
        next.current_step = JobStatus::Queued.step_description().to_string();
        next.error = None;
        next.result = None;
        next.topic_count = None;
        next.run += 1;
        next.updated_at = Utc::now();
        let stored = self.repo.replace(next).await?;
        info!(job_id, run = stored.run, "job resubmitted");
        self.spawn_driver(stored.clone(), guard);
        Ok(stored)
    }

    fn claim(&self, job_id: &str) -> Result<RunGuard> {
        let mut running = self.running.lock();
        if running.contains(job_id) {
            return Err(Error::invalid(format!("Job {job_id} is still being processed.")));
        }
        let max = self.settings.limits.max_concurrent_jobs;
        if running.len() >= max {
            return Err(Error::QueueFull(max));
        }
        running.insert(job_id.to_string());
        Ok(RunGuard { running: Arc::clone(&self.running), job_id: job_id.to_string() })
    }

    fn spawn_driver(&self, session: Session, guard: RunGuard) {
        let tracker = self.clone();
        tokio::spawn(async move { tracker.drive(session, guard).await });
    }

    async fn observe(&self, session: Session) -> Result<Session> {
        let timeout = self.settings.session.staleness_timeout();
        if !session.is_stale(Utc::now(), timeout) {
            return Ok(session);
        }
        let last_status = session.status;
        let mut next = session.clone();
        next.status = JobStatus::Interrupted;
        next.current_step = JobStatus::Interrupted.step_description().to_string();
        next.error = Some(format!(
            "No progress for over {}s; the job was presumed abandoned.",
            self.settings.session.staleness_timeout_secs
        ));
        next.updated_at = Utc::now();
        match self.repo.replace(next).await {
            Ok(stored) => {
                warn!(job_id = %stored.job_id, %last_status, progress = stored.progress, "stale job marked interrupted");
                Ok(stored)
            }
            // Someone else wrote first; their copy wins.
            Err(Error::Conflict { .. }) => self
                .repo
                .get(&session.job_id)
                .await?
                .ok_or_else(|| Error::JobNotFound(session.job_id.clone())),
            Err(e) => Err(e),
        }
    }

    fn progress_at(&self, stage: JobStatus, elapsed: Duration) -> f64 {
        let plan = &self.settings.stages_ms;
        let total = plan.total_millis().max(1) as f64;
        let within = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX).min(plan.millis(stage));
        let pct = 100.0 * (plan.offset_millis(stage) + within) as f64 / total;
        ((pct * 10.0).round() / 10.0).min(PROGRESS_CAP)
    }

    /// Applies `update` to the driver's copy and stores it. `None` means the
    /// driver no longer owns the session: it was deleted, finished or
    /// interrupted by someone else, or restarted as a new run.
    async fn persist<F>(&self, current: Session, update: F) -> Option<Session>
    where
        F: Fn(&mut Session) + Send + Sync,
    {
        let mut base = current;
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut next = base.clone();
            update(&mut next);
            next.updated_at = Utc::now();
            match self.repo.replace(next).await {
                Ok(stored) => return Some(stored),
                Err(Error::Conflict { .. }) => match self.repo.get(&base.job_id).await {
                    Ok(Some(latest)) if latest.status.is_active() && latest.run == base.run => base = latest,
                    _ => {
                        info!(job_id = %base.job_id, run = base.run, "job changed hands; driver stops");
                        return None;
                    }
                },
                Err(e) => {
                    warn!(job_id = %base.job_id, error = %e, "cannot store job state; driver stops");
                    return None;
                }
            }
        }
        warn!(job_id = %base.job_id, "gave up storing job state after repeated conflicts");
        None
    }

    async fn transition(&self, session: Session, to: JobStatus) -> Option<Session> {
        if !session.status.can_transition_to(to) {
            error!(job_id = %session.job_id, from = %session.status, %to, "illegal job transition");
            return None;
        }
        let floor = self.progress_at(to, Duration::ZERO);
        let stored = self
            .persist(session, move |s| {
                s.status = to;
                s.current_step = to.step_description().to_string();
                s.progress = s.progress.max(floor);
            })
            .await?;
        info!(job_id = %stored.job_id, status = %to, progress = stored.progress, "job advanced");
        Some(stored)
    }

    async fn tick(&self, session: Session, stage: JobStatus, elapsed: Duration) -> Option<Session> {
        let p = self.progress_at(stage, elapsed);
        self.persist(session, move |s| s.progress = s.progress.max(p)).await
    }

    async fn drive(self, mut session: Session, _guard: RunGuard) {
        let heartbeat = self.settings.session.heartbeat();
        info!(job_id = %session.job_id, run = session.run, "job started");

        for stage in JobStatus::PIPELINE {
            if session.status != stage {
                session = match self.transition(session, stage).await {
                    Some(s) => s,
                    None => return,
                };
            }
            if stage == JobStatus::Labeling {
                break;
            }
            let budget = self.settings.stages_ms.duration(stage);
            let started = Instant::now();
            while started.elapsed() < budget {
                tokio::time::sleep(heartbeat.min(budget.saturating_sub(started.elapsed()))).await;
                session = match self.tick(session, stage, started.elapsed()).await {
                    Some(s) => s,
                    None => return,
                };
            }
        }

        // Labeling lasts as long as the compute call; heartbeats keep the
        // session fresh meanwhile.
        let texts = Arc::clone(&session.texts);
        let config = session.config.clone();
        let mut compute = self.compute.compute(&texts, &config);
        let labeling = Instant::now();
        let mut ticker = tokio::time::interval(heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        let outcome = loop {
            tokio::select! {
                res = &mut compute => break res,
                _ = ticker.tick() => {
                    session = match self.tick(session, JobStatus::Labeling, labeling.elapsed()).await {
                        Some(s) => s,
                        None => return,
                    };
                }
            }
        };

        match outcome {
            Ok(result) => self.complete(session, result).await,
            Err(e) => self.fail(session, format!("{e:#}")).await,
        }
    }

    async fn complete(&self, session: Session, mut result: ClusteringResult) {
        let job_id = session.job_id.clone();
        result.job_id = Some(job_id.clone());
        result.normalize();
        if let Err(violation) = result.check_invariants() {
            error!(job_id = %job_id, %violation, "compute returned an inconsistent result");
            self.fail(session, Error::pipeline("clustering").to_string()).await;
            return;
        }
        if let Some(analyzer) = self.analyzer.as_ref().filter(|a| self.settings.suggestions.enabled && a.is_available()) {
            let max = self.settings.suggestions.max_per_pass;
            let ctx = suggestions::refine_context(&result, &[], max);
            match analyzer.propose(&ctx).await {
                Ok(proposed) => result = suggestions::merge_generated(&result, proposed, max).0,
                Err(e) => warn!(job_id = %job_id, error = %e, "initial suggestions unavailable"),
            }
        }

        let topic_count = result.topics.len();
        let result = Arc::new(result);
        let stored = self
            .persist(session, move |s| {
                s.status = JobStatus::Completed;
                s.progress = 100.0;
                s.current_step = JobStatus::Completed.step_description().to_string();
                s.topic_count = Some(topic_count);
                s.result = Some(Arc::clone(&result));
                s.error = None;
            })
            .await;
        if let Some(stored) = stored {
            info!(job_id = %job_id, topics = topic_count, noise = stored.result.as_ref().map_or(0, |r| r.noise), "job completed");
        }
    }

    async fn fail(&self, session: Session, message: String) {
        error!(job_id = %session.job_id, error = %message, "job failed");
        self.persist(session, move |s| {
            s.status = JobStatus::Failed;
            s.current_step = JobStatus::Failed.step_description().to_string();
            s.error = Some(message.clone());
        })
        .await;
    }
}
