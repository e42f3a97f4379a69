use std::sync::Arc;

use zrep_core::MetricsSink;
use zrep_db::Storage;
use zrep_events::WebhookDispatcher;

use crate::config::ServerConfig;
use crate::registry::JobRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// The storage backend (in-memory or Postgres) behind the trait object.
    pub storage: Arc<dyn Storage>,
    /// Job creation and read paths.
    pub registry: JobRegistry,
    /// Webhook subscription registry and event fan-out.
    pub dispatcher: WebhookDispatcher,
    /// Passive counters, exposed by the stats and metrics routes.
    pub metrics: Arc<MetricsSink>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
