use chrono::{Duration, Utc};
use std::sync::Arc;

use topichub_core::config::SessionSettings;
use topichub_core::error::Error;
use topichub_core::traits::{CheckpointStore, SessionRepository};
use topichub_core::types::{ClusteringConfig, ClusteringResult, JobStatus, Session};
use topichub_session::{InMemoryCheckpointStore, InMemorySessionRepository};

fn session(id: &str) -> Session {
    Session::new(id, vec!["a".into(), "b".into()], ClusteringConfig::default(), Utc::now())
}

#[tokio::test]
async fn replace_bumps_version_and_rejects_stale_writers() {
    let repo = InMemorySessionRepository::default();
    let stored = repo.insert(session("j1")).await.expect("insert");
    assert_eq!(stored.version, 0);

    // Two writers read the same version.
    let mut first = stored.clone();
    let mut second = stored.clone();
    first.progress = 10.0;
    second.progress = 20.0;

    let after_first = repo.replace(first).await.expect("first write");
    assert_eq!(after_first.version, 1);
    let err = repo.replace(second).await.expect_err("lost update caught");
    assert_eq!(err, Error::Conflict { job_id: "j1".into(), expected: 0, found: 1 });
    assert_eq!(repo.get("j1").await.expect("get").expect("present").progress, 10.0);
}

#[tokio::test]
async fn insert_rejects_duplicate_ids_and_replace_needs_existing() {
    let repo = InMemorySessionRepository::default();
    repo.insert(session("dup")).await.expect("insert");
    assert!(matches!(repo.insert(session("dup")).await, Err(Error::InvalidInput(_))));
    assert!(matches!(repo.replace(session("nope")).await, Err(Error::JobNotFound(_))));
}

#[tokio::test]
async fn expired_sessions_vanish_and_get_purged() {
    let settings = SessionSettings { job_ttl_secs: 60, result_ttl_secs: 600, ..Default::default() };
    let repo = InMemorySessionRepository::new(&settings);

    let mut old_failed = session("old-failed");
    old_failed.status = JobStatus::Failed;
    old_failed.updated_at = Utc::now() - Duration::seconds(120);
    let mut old_completed = session("old-completed");
    old_completed.status = JobStatus::Completed;
    old_completed.updated_at = Utc::now() - Duration::seconds(120);
    repo.insert(old_failed).await.expect("insert");
    repo.insert(old_completed).await.expect("insert");

    assert!(repo.get("old-failed").await.expect("get").is_none(), "past job ttl");
    assert!(repo.get("old-completed").await.expect("get").is_some(), "results live longer");
    assert_eq!(repo.list().await.expect("list").len(), 1);
    assert_eq!(repo.purge_expired(Utc::now()).await.expect("purge"), vec!["old-failed".to_string()]);
    assert_eq!(
        repo.purge_expired(Utc::now() + Duration::seconds(700)).await.expect("purge"),
        vec!["old-completed".to_string()]
    );
}

#[tokio::test]
async fn checkpoints_pop_in_lifo_order_and_respect_depth() {
    let store = InMemoryCheckpointStore::new(2);
    for total in 1..=3 {
        let result = ClusteringResult { total_documents: total, ..Default::default() };
        store.save("j", Arc::new(result)).await.expect("save");
    }
    assert_eq!(store.depth("j").await.expect("depth"), 2);
    assert_eq!(store.undo("j").await.expect("undo").expect("top").result.total_documents, 3);
    assert_eq!(store.undo("j").await.expect("undo").expect("next").result.total_documents, 2);
    assert!(store.undo("j").await.expect("undo").is_none(), "oldest was dropped");
    assert!(store.undo("other").await.expect("undo").is_none());
}

#[tokio::test]
async fn clearing_checkpoints_only_touches_one_job() {
    let store = InMemoryCheckpointStore::new(4);
    store.save("a", Arc::new(ClusteringResult::default())).await.expect("save");
    store.save("b", Arc::new(ClusteringResult::default())).await.expect("save");
    store.clear("a").await.expect("clear");
    assert_eq!(store.depth("a").await.expect("depth"), 0);
    assert_eq!(store.depth("b").await.expect("depth"), 1);
}
