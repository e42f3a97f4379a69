//! Webhook subscription registry and delivery for tier events.
//!
//! This crate provides the push side of the orchestrator:
//!
//! - [`EventKind`] / [`WebhookEvent`] — the event envelope delivered to
//!   subscribers.
//! - [`Subscription`] — a standing registration for a partner protocol.
//! - [`WebhookDispatcher`] — subscription CRUD plus non-blocking fan-out
//!   with bounded delivery concurrency.
//! - [`WebhookDelivery`] — a single signed HTTP POST per matched
//!   subscription, best-effort and never retried.

pub mod delivery;
pub mod dispatcher;
pub mod event;
pub mod subscription;

pub use delivery::{DeliveryError, WebhookDelivery};
pub use dispatcher::WebhookDispatcher;
pub use event::{EventData, EventKind, WebhookEvent};
pub use subscription::{SubscribeRequest, Subscription};
