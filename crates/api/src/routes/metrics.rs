//! Prometheus metrics route.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// GET /metrics -- counter/gauge/histogram snapshot in the Prometheus
/// text exposition format.
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render_prometheus(),
    )
}

/// Mount the metrics route (root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}
