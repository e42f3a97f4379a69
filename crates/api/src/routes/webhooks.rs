//! Webhook subscription management routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use zrep_events::{EventKind, SubscribeRequest};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Body for `POST /api/webhooks/subscribe`. Presence of the required
/// fields is checked here so a missing field is a 400, not a
/// deserialization rejection.
#[derive(Debug, Deserialize)]
struct SubscribeBody {
    owner_address: Option<String>,
    callback_url: Option<String>,
    events: Option<Vec<EventKind>>,
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionListQuery {
    owner_address: Option<String>,
}

/// POST /api/webhooks/subscribe -- register a callback for tier events.
async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeBody>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let (Some(owner_address), Some(callback_url)) = (body.owner_address, body.callback_url) else {
        return Err(AppError::BadRequest(
            "owner_address and callback_url are required".to_string(),
        ));
    };

    let subscription = state
        .dispatcher
        .subscribe(SubscribeRequest {
            owner_address,
            callback_url,
            events: body.events,
            secret: body.secret,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "subscription": subscription })),
    ))
}

/// GET /api/webhooks/subscriptions -- list subscriptions, optionally by owner.
async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let subscriptions = state.dispatcher.list(query.owner_address.as_deref()).await;
    Ok(Json(json!({ "subscriptions": subscriptions })))
}

/// DELETE /api/webhooks/subscriptions/{id} -- remove a subscription.
async fn unsubscribe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.dispatcher.unsubscribe(&id).await?;
    Ok(Json(json!({ "message": "Subscription deleted" })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/subscribe", post(subscribe))
        .route("/webhooks/subscriptions", get(list_subscriptions))
        .route("/webhooks/subscriptions/{id}", delete(unsubscribe))
}
