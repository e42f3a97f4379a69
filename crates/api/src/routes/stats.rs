//! Aggregate statistics routes.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/stats -- overall storage aggregates.
async fn overall_stats(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let stats = state.storage.get_stats().await?;
    Ok(Json(json!({
        "stats": {
            "total_jobs": stats.total_jobs,
            "jobs_by_status": stats.jobs_by_status,
            "total_tiers": stats.total_tiers,
            "tiers_by_tier": stats.tiers_by_tier,
            "timestamp": Utc::now(),
        }
    })))
}

/// GET /api/stats/jobs -- job counts by status.
async fn job_stats(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let stats = state.storage.get_stats().await?;
    Ok(Json(json!({
        "by_status": stats.jobs_by_status,
        "total": stats.total_jobs,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/stats/tiers -- tier distribution across addresses.
async fn tier_stats(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let stats = state.storage.get_stats().await?;
    Ok(Json(json!({
        "distribution": stats.tiers_by_tier,
        "total": stats.total_tiers,
        "timestamp": Utc::now(),
    })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(overall_stats))
        .route("/stats/jobs", get(job_stats))
        .route("/stats/tiers", get(tier_stats))
}
