//! Loyalty Tier Models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Loyalty tier (会员等级), ordered from lowest to highest
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// All tiers in ascending order
    pub const ALL: [Tier; 4] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Platinum];

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of a tier table: the minimum tier points needed to hold `tier`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub tier: Tier,
    pub min_tier_points: i64,
}

impl TierThreshold {
    pub const fn new(tier: Tier, min_tier_points: i64) -> Self {
        Self {
            tier,
            min_tier_points,
        }
    }
}

/// Progress within the current tier band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProgress {
    /// Points still missing to reach `next_tier` (0 at the top tier)
    pub points_to_next_tier: i64,
    /// Next tier up, `None` at the top tier
    pub next_tier: Option<Tier>,
    /// Always within `[0, 100]`
    pub progress_percentage: f64,
}

impl TierProgress {
    /// Progress value for a member already at the top tier
    pub fn top() -> Self {
        Self {
            points_to_next_tier: 0,
            next_tier: None,
            progress_percentage: 100.0,
        }
    }
}

impl Default for TierProgress {
    fn default() -> Self {
        Self {
            points_to_next_tier: 0,
            next_tier: None,
            progress_percentage: 0.0,
        }
    }
}
