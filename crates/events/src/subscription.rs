//! Webhook subscription models.

use serde::{Deserialize, Serialize};
use zrep_core::Timestamp;

use crate::event::EventKind;

/// A standing webhook registration for a partner protocol.
///
/// The signing secret is write-only: it is accepted on subscribe and used
/// to sign deliveries, but never serialized back to callers.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: String,
    pub owner_address: String,
    pub callback_url: String,
    pub events: Vec<EventKind>,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub active: bool,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<Timestamp>,
}

impl Subscription {
    /// Whether this subscription should receive `event`.
    pub fn wants(&self, event: EventKind) -> bool {
        self.active && self.events.contains(&event)
    }
}

/// Input for `POST /api/webhooks/subscribe`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub owner_address: String,
    pub callback_url: String,
    /// Defaults to `[tier_upgrade, badge_minted]` when omitted.
    pub events: Option<Vec<EventKind>>,
    pub secret: Option<String>,
}

/// Event set applied when a subscriber does not name one.
pub const DEFAULT_EVENTS: [EventKind; 2] = [EventKind::TierUpgrade, EventKind::BadgeMinted];
