//! Ordered reputation tiers.
//!
//! Tiers are strictly ordered (`NONE < BRONZE < SILVER < GOLD < PLATINUM`)
//! and each tier maps to a fixed score. The tier a caller supplies at job
//! creation is provisional; only the tier the prover returns on completion
//! is authoritative.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Reputation tier assigned to an address on job completion.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    #[default]
    None,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// All tiers in ascending order.
pub const ALL_TIERS: [Tier; 5] = [
    Tier::None,
    Tier::Bronze,
    Tier::Silver,
    Tier::Gold,
    Tier::Platinum,
];

impl Tier {
    /// Stable wire/database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::None => "NONE",
            Tier::Bronze => "BRONZE",
            Tier::Silver => "SILVER",
            Tier::Gold => "GOLD",
            Tier::Platinum => "PLATINUM",
        }
    }

    /// Fixed score for this tier.
    pub fn score(self) -> i32 {
        match self {
            Tier::None => 0,
            Tier::Bronze => 100,
            Tier::Silver => 200,
            Tier::Gold => 500,
            Tier::Platinum => 1000,
        }
    }

    /// Position in [`ALL_TIERS`]; used for per-tier counter slots.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parse the wire representation.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "NONE" => Ok(Tier::None),
            "BRONZE" => Ok(Tier::Bronze),
            "SILVER" => Ok(Tier::Silver),
            "GOLD" => Ok(Tier::Gold),
            "PLATINUM" => Ok(Tier::Platinum),
            other => Err(CoreError::Validation(format!(
                "Unknown tier '{other}'. Expected one of: NONE, BRONZE, SILVER, GOLD, PLATINUM"
            ))),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_strictly_ordered() {
        assert!(Tier::None < Tier::Bronze);
        assert!(Tier::Bronze < Tier::Silver);
        assert!(Tier::Silver < Tier::Gold);
        assert!(Tier::Gold < Tier::Platinum);
    }

    #[test]
    fn scores_are_monotone_per_tier() {
        let scores: Vec<i32> = ALL_TIERS.iter().map(|t| t.score()).collect();
        assert_eq!(scores, vec![0, 100, 200, 500, 1000]);
    }

    #[test]
    fn round_trips_wire_representation() {
        for tier in ALL_TIERS {
            assert_eq!(Tier::parse(tier.as_str()).unwrap(), tier);
        }
    }

    #[test]
    fn parse_rejects_unknown_tier() {
        assert!(Tier::parse("DIAMOND").is_err());
        assert!(Tier::parse("gold").is_err());
    }

    #[test]
    fn serializes_uppercase() {
        let json = serde_json::to_string(&Tier::Gold).unwrap();
        assert_eq!(json, "\"GOLD\"");
    }

    #[test]
    fn default_is_none() {
        assert_eq!(Tier::default(), Tier::None);
    }
}
