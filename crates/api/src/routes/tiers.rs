//! Tier lookup routes.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use zrep_core::{validation, CoreError};

use crate::error::AppResult;
use crate::state::AppState;

/// Default page size for tier history.
const DEFAULT_HISTORY_LIMIT: i64 = 10;

/// Maximum page size for tier history.
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

/// GET /api/tiers/{address} -- the address's current (latest) tier.
async fn get_tier(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    validation::validate_address(&address)?;
    state.metrics.record_tier_query();

    let record = state
        .storage
        .get_tier(&address)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "tier",
            id: address,
        })?;
    Ok(Json(json!({ "tier": record })))
}

/// GET /api/tiers/{address}/history -- most-recent-first tier snapshots.
async fn get_tier_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<serde_json::Value>> {
    validation::validate_address(&address)?;
    state.metrics.record_tier_query();

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let history = state.storage.get_tier_history(&address, limit).await?;
    Ok(Json(json!({ "history": history })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tiers/{address}", get(get_tier))
        .route("/tiers/{address}/history", get(get_tier_history))
}
