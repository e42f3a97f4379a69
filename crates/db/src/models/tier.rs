//! Tier history entity.

use serde::Serialize;
use zrep_core::{Tier, Timestamp};

/// A resolved tier snapshot for an address.
///
/// Appended (never overwritten) to the per-address history when a job
/// completes; the newest entry is the address's current tier.
#[derive(Debug, Clone, Serialize)]
pub struct TierRecord {
    pub address: String,
    pub tier: Tier,
    /// Fixed per-tier score, see [`Tier::score`].
    pub score: i32,
    /// Opaque ciphertext reference for the encrypted activity total.
    pub encrypted_total: String,
    /// Coarse activity magnitude, not an exact amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_hint: Option<i64>,
    pub updated_at: Timestamp,
}
