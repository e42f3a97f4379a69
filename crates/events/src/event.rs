//! Event types delivered to webhook subscribers.

use serde::{Deserialize, Serialize};
use zrep_core::{CoreError, Tier, Timestamp};

/// Kinds of tier events a protocol can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TierUpgrade,
    TierDowngrade,
    BadgeMinted,
}

impl EventKind {
    /// Stable wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TierUpgrade => "tier_upgrade",
            EventKind::TierDowngrade => "tier_downgrade",
            EventKind::BadgeMinted => "badge_minted",
        }
    }

    /// Parse the wire representation.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "tier_upgrade" => Ok(EventKind::TierUpgrade),
            "tier_downgrade" => Ok(EventKind::TierDowngrade),
            "badge_minted" => Ok(EventKind::BadgeMinted),
            other => Err(CoreError::Validation(format!(
                "Unknown event '{other}'. Expected one of: tier_upgrade, tier_downgrade, badge_minted"
            ))),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload data for a tier event.
#[derive(Debug, Clone, Serialize)]
pub struct EventData {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_tier: Option<Tier>,
    pub new_tier: Tier,
    pub score: i32,
    pub proof_hash: String,
}

/// The JSON envelope POSTed to each subscriber's callback URL.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub event: EventKind,
    pub timestamp: Timestamp,
    pub data: EventData,
}
