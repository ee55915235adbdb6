use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use topichub_core::traits::CheckpointStore;
use topichub_core::types::{Checkpoint, ClusteringResult};

/// Bounded LIFO of result snapshots per job. Pushing past `max_depth`
/// drops the oldest snapshot.
pub struct InMemoryCheckpointStore {
    stacks: Mutex<HashMap<String, Vec<Checkpoint>>>,
    max_depth: usize,
}

impl InMemoryCheckpointStore {
    pub fn new(max_depth: usize) -> Self {
        Self { stacks: Mutex::new(HashMap::new()), max_depth: max_depth.max(1) }
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, job_id: &str, result: Arc<ClusteringResult>) -> anyhow::Result<()> {
        let mut stacks = self.stacks.lock();
        let stack = stacks.entry(job_id.to_string()).or_default();
        stack.push(Checkpoint { job_id: job_id.to_string(), created_at: Utc::now(), result });
        if stack.len() > self.max_depth {
            let excess = stack.len() - self.max_depth;
            stack.drain(..excess);
        }
        Ok(())
    }

    async fn undo(&self, job_id: &str) -> anyhow::Result<Option<Checkpoint>> {
        Ok(self.stacks.lock().get_mut(job_id).and_then(Vec::pop))
    }

    async fn depth(&self, job_id: &str) -> anyhow::Result<usize> {
        Ok(self.stacks.lock().get(job_id).map_or(0, Vec::len))
    }

    async fn clear(&self, job_id: &str) -> anyhow::Result<()> {
        self.stacks.lock().remove(job_id);
        Ok(())
    }
}
