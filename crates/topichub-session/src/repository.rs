use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use topichub_core::config::SessionSettings;
use topichub_core::error::{Error, Result};
use topichub_core::traits::SessionRepository;
use topichub_core::types::{JobId, JobStatus, Session};

/// Process-local session map with version-checked writes.
///
/// Completed sessions are retained for `result_ttl`, everything else for
/// `job_ttl`, both measured from the last write. Expired entries read as
/// absent and are dropped by [`SessionRepository::purge_expired`].
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
    job_ttl: Duration,
    result_ttl: Duration,
}

impl InMemorySessionRepository {
    pub fn new(settings: &SessionSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            job_ttl: secs(settings.job_ttl_secs),
            result_ttl: secs(settings.result_ttl_secs),
        }
    }

    fn expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        let ttl = if session.status == JobStatus::Completed { self.result_ttl } else { self.job_ttl };
        now.signed_duration_since(session.updated_at) > ttl
    }
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new(&SessionSettings::default())
    }
}

fn secs(s: u64) -> Duration {
    Duration::seconds(s.min(i64::MAX as u64 / 1_000) as i64)
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, session: Session) -> Result<Session> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.job_id) {
            return Err(Error::invalid(format!("Job {} already exists.", session.job_id)));
        }
        sessions.insert(session.job_id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Session>> {
        let now = Utc::now();
        Ok(self.sessions.read().get(job_id).filter(|s| !self.expired(s, now)).cloned())
    }

    async fn replace(&self, mut session: Session) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let stored = sessions
            .get_mut(&session.job_id)
            .ok_or_else(|| Error::JobNotFound(session.job_id.clone()))?;
        if stored.version != session.version {
            return Err(Error::Conflict {
                job_id: session.job_id.clone(),
                expected: session.version,
                found: stored.version,
            });
        }
        session.version += 1;
        *stored = session.clone();
        Ok(session)
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        Ok(self.sessions.write().remove(job_id).is_some())
    }

    async fn list(&self) -> Result<Vec<Session>> {
        let now = Utc::now();
        let mut all: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| !self.expired(s, now))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<JobId>> {
        let mut sessions = self.sessions.write();
        let mut purged = Vec::new();
        sessions.retain(|id, s| {
            let keep = !self.expired(s, now);
            if !keep {
                purged.push(id.clone());
            }
            keep
        });
        Ok(purged)
    }
}
