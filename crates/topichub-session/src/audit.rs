use async_trait::async_trait;

use topichub_core::traits::AuditLog;
use topichub_core::types::TopicId;

/// Writes label changes to the `audit` tracing target.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record_rename(&self, job_id: &str, topic_id: TopicId, old_label: &str, new_label: &str) -> anyhow::Result<()> {
        tracing::info!(target: "audit", job_id, topic_id, old_label, new_label, "topic renamed");
        Ok(())
    }
}
