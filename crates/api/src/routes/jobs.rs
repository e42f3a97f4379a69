//! Job submission and polling routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use zrep_core::JobStatus;
use zrep_db::models::job::JobFilter;

use crate::error::AppResult;
use crate::registry::CreateJob;
use crate::state::AppState;

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Query parameters for `GET /api/jobs/range`.
#[derive(Debug, Deserialize)]
struct JobListQuery {
    address: Option<String>,
    /// Wire status string (e.g. `pending`, `failed`).
    status: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    limit: Option<i64>,
}

/// POST /api/jobs/range -- accept a new range-proof job.
///
/// Returns 202: the work happens asynchronously and the caller polls the
/// read path (or subscribes to webhooks) for the outcome.
async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<CreateJob>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let job = state.registry.create_job(input).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "job": job }))))
}

/// GET /api/jobs/range -- list jobs with optional filters.
async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let status = query
        .status
        .as_deref()
        .map(JobStatus::parse)
        .transpose()?;

    let filter = JobFilter {
        address: query.address,
        status,
        limit: Some(query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)),
    };
    let jobs = state.registry.list_jobs(&filter).await?;
    Ok(Json(json!({ "jobs": jobs })))
}

/// GET /api/jobs/range/{id} -- poll a single job.
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let job = state.registry.get_job(id).await?;
    Ok(Json(json!({ "job": job })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs/range", get(list_jobs).post(submit_job))
        .route("/jobs/range/{id}", get(get_job))
}
