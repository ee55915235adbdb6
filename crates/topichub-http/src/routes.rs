use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use topichub_core::types::{ClusteringResult, Session};
use topichub_session::{Edited, RefineOutcome, RenameOutcome, SessionService};

use crate::dto::{
    Ack, ExcludeRequest, GenerateLabelsRequest, Health, JobAccepted, JobRequest, JobSummary, MergeRequest,
    ReclassifyBody, ReclusterRequest, RefineRequest, RenameRequest, SplitRequest, SubmitRequest, SuggestionRequest,
};
use crate::error::ApiError;

type ApiResult<T> = Result<Json<T>, ApiError>;
type Payload<T> = Result<Json<T>, JsonRejection>;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SessionService>,
}

pub fn router(service: Arc<SessionService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cluster", post(submit))
        .route("/cluster/jobs", get(list_jobs))
        .route("/cluster/job/:job_id", get(job_status).delete(delete_job))
        .route("/cluster/job/:job_id/resubmit", post(resubmit))
        .route("/cluster/recluster", post(recluster))
        .route("/cluster/merge", post(merge))
        .route("/cluster/split", post(split))
        .route("/cluster/reclassify", post(reclassify))
        .route("/cluster/rename", patch(rename))
        .route("/cluster/exclude", post(exclude))
        .route("/cluster/generate-labels", post(generate_labels))
        .route("/cluster/refine", post(refine))
        .route("/cluster/suggestions/apply", post(apply_suggestion))
        .route("/cluster/suggestions/apply-all", post(apply_all_suggestions))
        .route("/cluster/suggestions/dismiss", post(dismiss_suggestion))
        .route("/cluster/undo", post(undo))
        .route("/cluster/checkpoint", post(save_checkpoint))
        .with_state(AppState { service })
}

/// The stored result with the operation's info block under `key` and the
/// session version next to it.
fn edited<I: Serialize>(key: &str, out: Edited<I>) -> ApiResult<Value> {
    with_result(&out.result, [(key, serde_json::to_value(out.info)?)], out.version)
}

fn with_result<'a>(
    result: &ClusteringResult,
    extra: impl IntoIterator<Item = (&'a str, Value)>,
    version: u64,
) -> ApiResult<Value> {
    let mut body = match serde_json::to_value(result)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (k, v) in extra {
        body.insert(k.to_string(), v);
    }
    body.insert("version".to_string(), Value::from(version));
    Ok(Json(Value::Object(body)))
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let settings = state.service.settings();
    Json(Health {
        status: "ok",
        active_jobs: state.service.active_jobs(),
        suggestions_enabled: settings.suggestions.enabled,
        checkpoints_enabled: settings.checkpoints.enabled,
    })
}

async fn submit(State(state): State<AppState>, body: Payload<SubmitRequest>) -> ApiResult<JobAccepted> {
    let Json(req) = body?;
    let mut config = req.config;
    if let Some(iteration) = req.iteration {
        config.iteration = iteration;
    }
    let session = state.service.submit(req.texts, config).await?;
    Ok(Json(JobAccepted::from(&session)))
}

async fn list_jobs(State(state): State<AppState>) -> ApiResult<Vec<JobSummary>> {
    let sessions = state.service.list().await?;
    Ok(Json(sessions.into_iter().map(JobSummary::from).collect()))
}

async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Session> {
    Ok(Json(state.service.status(&job_id).await?))
}

async fn delete_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Ack> {
    state.service.delete(&job_id).await?;
    Ok(Json(Ack { ok: true, job_id }))
}

async fn resubmit(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<JobAccepted> {
    let session = state.service.resubmit(&job_id).await?;
    Ok(Json(JobAccepted::from(&session)))
}

async fn recluster(State(state): State<AppState>, body: Payload<ReclusterRequest>) -> ApiResult<JobAccepted> {
    let Json(req) = body?;
    let session = state.service.recluster(&req.job_id, req.config).await?;
    Ok(Json(JobAccepted::from(&session)))
}

async fn merge(State(state): State<AppState>, body: Payload<MergeRequest>) -> ApiResult<Value> {
    let Json(req) = body?;
    let out = state
        .service
        .merge(&req.job_id, &req.cluster_ids, req.new_label.as_deref(), req.expected_version)
        .await?;
    edited("mergeInfo", out)
}

async fn split(State(state): State<AppState>, body: Payload<SplitRequest>) -> ApiResult<Value> {
    let Json(req) = body?;
    let out = state.service.split(&req.job_id, req.cluster_id, req.num_subclusters, req.expected_version).await?;
    edited("splitInfo", out)
}

async fn reclassify(State(state): State<AppState>, body: Payload<ReclassifyBody>) -> ApiResult<Value> {
    let Json(req) = body?;
    let out = state.service.reclassify(&req.job_id, &req.request, req.expected_version).await?;
    edited("reclassifyInfo", out)
}

async fn rename(State(state): State<AppState>, body: Payload<RenameRequest>) -> ApiResult<RenameOutcome> {
    let Json(req) = body?;
    Ok(Json(state.service.rename(&req.job_id, req.topic_id, &req.new_label, req.expected_version).await?))
}

async fn exclude(State(state): State<AppState>, body: Payload<ExcludeRequest>) -> ApiResult<Value> {
    let Json(req) = body?;
    let out = state.service.exclude(&req.job_id, &req.document_ids, req.excluded, req.expected_version).await?;
    edited("excludeInfo", out)
}

async fn generate_labels(State(state): State<AppState>, body: Payload<GenerateLabelsRequest>) -> ApiResult<Value> {
    let Json(req) = body?;
    let out = state.service.generate_labels(&req.job_id, &req.topic_ids, req.expected_version).await?;
    let timestamp = Value::from(Utc::now().to_rfc3339());
    with_result(&out.result, [("labelsInfo", serde_json::to_value(out.info)?), ("timestamp", timestamp)], out.version)
}

async fn refine(State(state): State<AppState>, body: Payload<RefineRequest>) -> ApiResult<RefineOutcome> {
    let Json(req) = body?;
    Ok(Json(state.service.refine(&req.job_id, &req.focus_areas, req.expected_version).await?))
}

async fn apply_suggestion(State(state): State<AppState>, body: Payload<SuggestionRequest>) -> ApiResult<Value> {
    let Json(req) = body?;
    let out = state.service.apply_suggestion(&req.job_id, &req.suggestion_id, req.expected_version).await?;
    edited("appliedInfo", out)
}

async fn apply_all_suggestions(State(state): State<AppState>, body: Payload<JobRequest>) -> ApiResult<Value> {
    let Json(req) = body?;
    let out = state.service.apply_all_suggestions(&req.job_id, req.expected_version).await?;
    edited("outcomes", out)
}

async fn dismiss_suggestion(State(state): State<AppState>, body: Payload<SuggestionRequest>) -> ApiResult<Value> {
    let Json(req) = body?;
    let out = state.service.dismiss_suggestion(&req.job_id, &req.suggestion_id, req.expected_version).await?;
    with_result(&out.result, [("dismissed", Value::from(req.suggestion_id))], out.version)
}

async fn undo(State(state): State<AppState>, body: Payload<JobRequest>) -> ApiResult<Value> {
    let Json(req) = body?;
    let session = state.service.undo(&req.job_id, req.expected_version).await?;
    let result = session.result.unwrap_or_default();
    with_result(&result, std::iter::empty(), session.version)
}

async fn save_checkpoint(State(state): State<AppState>, body: Payload<JobRequest>) -> ApiResult<Ack> {
    let Json(req) = body?;
    state.service.save_checkpoint(&req.job_id).await?;
    Ok(Json(Ack { ok: true, job_id: req.job_id }))
}
