//! Route modules. Each exports a `router()` mounted by
//! [`build_app_router`](crate::router::build_app_router); everything
//! except health and metrics lives under `/api`.

pub mod health;
pub mod jobs;
pub mod metrics;
pub mod stats;
pub mod tiers;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// All routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(jobs::router())
        .merge(tiers::router())
        .merge(webhooks::router())
        .merge(stats::router())
}
