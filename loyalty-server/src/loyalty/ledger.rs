//! Ledger Core
//!
//! The five mutations of a membership aggregate: earn, redeem, full
//! adjustment, redeemable-only adjustment, and tier recomputation. Each
//! function either fails without touching the membership or applies the
//! whole change. Persistence and serialization live in the Ledger Store.
//!
//! Balance rules:
//! - `tier_points` moves only on earn and full adjustment
//! - `available_points` moves on every operation except tier recomputation
//! - `total_points` moves on earn (and expiration), never on redemption
//! - all three stay `>= 0`

use serde::Deserialize;
use shared::models::{
    AdjustmentKind, AdjustmentScope, EarnLot, Membership, PointsActivity, PointsActivityKind,
    Redemption, RedemptionStatus, Tier, TierChange,
};
use shared::util::add_months_millis;

use super::error::{LedgerError, LedgerResult};
use super::tier_policy::TierPolicy;

/// Lot lifetime when the caller does not choose one
pub const DEFAULT_EXPIRATION_MONTHS: u32 = 12;

/// Earn request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EarnPoints {
    pub points: i64,
    pub description: String,
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub expiration_months: Option<u32>,
    /// Property where the stay happened, if not the membership's own
    #[serde(default)]
    pub earned_at_property_id: Option<String>,
    #[serde(default)]
    pub spending: Option<f64>,
    #[serde(default)]
    pub nights: Option<i64>,
}

impl EarnPoints {
    pub fn new(points: i64, description: impl Into<String>) -> Self {
        Self {
            points,
            description: description.into(),
            source_ref: None,
            expiration_months: None,
            earned_at_property_id: None,
            spending: None,
            nights: None,
        }
    }

    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn expiring_in(mut self, months: u32) -> Self {
        self.expiration_months = Some(months);
        self
    }

    pub fn at_property(mut self, property_id: impl Into<String>) -> Self {
        self.earned_at_property_id = Some(property_id.into());
        self
    }

    pub fn with_stay(mut self, spending: f64, nights: i64) -> Self {
        self.spending = Some(spending);
        self.nights = Some(nights);
        self
    }
}

/// Redeem request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RedeemPoints {
    pub points: i64,
    /// Monetary value of the reward
    #[serde(default)]
    pub value: f64,
    pub reward_name: String,
    #[serde(default)]
    pub reward_ref: Option<String>,
    #[serde(default)]
    pub source_ref: Option<String>,
}

impl RedeemPoints {
    pub fn new(points: i64, value: f64, reward_name: impl Into<String>) -> Self {
        Self {
            points,
            value,
            reward_name: reward_name.into(),
            reward_ref: None,
            source_ref: None,
        }
    }

    pub fn with_reward_ref(mut self, reward_ref: impl Into<String>) -> Self {
        self.reward_ref = Some(reward_ref.into());
        self
    }

    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }
}

/// Administrative adjustment request; `delta` is signed and non-zero
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdjustPoints {
    pub delta: i64,
    pub reason: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl AdjustPoints {
    pub fn new(delta: i64, reason: impl Into<String>) -> Self {
        Self {
            delta,
            reason: reason.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Result of a tier recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierOutcome {
    pub previous: Tier,
    pub current: Tier,
}

impl TierOutcome {
    pub fn upgraded(&self) -> bool {
        self.current > self.previous
    }

    pub fn demoted(&self) -> bool {
        self.current < self.previous
    }

    pub fn changed(&self) -> bool {
        self.current != self.previous
    }
}

/// Append a lot and credit every balance.
pub fn earn(
    membership: &mut Membership,
    request: &EarnPoints,
    default_expiration_months: u32,
    now: i64,
) -> LedgerResult<()> {
    if request.points <= 0 {
        return Err(LedgerError::InvalidAmount(request.points));
    }
    let points = request.points;
    let months = request
        .expiration_months
        .unwrap_or(default_expiration_months);

    membership.earn_history.push(EarnLot {
        points,
        description: request.description.clone(),
        earned_at: now,
        expires_at: add_months_millis(now, months),
        source_ref: request.source_ref.clone(),
        property_id: request.earned_at_property_id.clone(),
        is_expired: false,
    });

    membership.tier_points = membership.tier_points.saturating_add(points);
    membership.available_points = membership.available_points.saturating_add(points);
    membership.total_points = membership.total_points.saturating_add(points);
    membership.lifetime_points_earned = membership.lifetime_points_earned.saturating_add(points);

    if let Some(spending) = request.spending {
        membership.lifetime_spending += spending.max(0.0);
    }
    if let Some(nights) = request.nights {
        membership.total_nights_stayed = membership.total_nights_stayed.saturating_add(nights.max(0));
    }

    membership.points_history.push(PointsActivity {
        kind: PointsActivityKind::Earned,
        points,
        description: request.description.clone(),
        reference: request.source_ref.clone(),
        note: None,
        occurred_at: now,
    });
    membership.last_activity_at = Some(now);
    Ok(())
}

/// Spend from the redeemable balance. Tier and total points stay put.
pub fn redeem(membership: &mut Membership, request: &RedeemPoints, now: i64) -> LedgerResult<()> {
    if request.points <= 0 {
        return Err(LedgerError::InvalidAmount(request.points));
    }
    if request.points > membership.available_points {
        return Err(LedgerError::InsufficientPoints {
            requested: request.points,
            available: membership.available_points,
        });
    }

    membership.available_points -= request.points;
    membership.lifetime_points_redeemed = membership
        .lifetime_points_redeemed
        .saturating_add(request.points);

    membership.redemption_history.push(Redemption {
        points: request.points,
        value: request.value,
        reward_ref: request.reward_ref.clone(),
        reward_name: request.reward_name.clone(),
        source_ref: request.source_ref.clone(),
        redeemed_at: now,
        status: RedemptionStatus::Applied,
    });
    membership.points_history.push(PointsActivity {
        kind: PointsActivityKind::Redeemed,
        points: -request.points,
        description: format!("Redeemed: {}", request.reward_name),
        reference: request.reward_ref.clone().or_else(|| request.source_ref.clone()),
        note: None,
        occurred_at: now,
    });
    membership.last_activity_at = Some(now);
    Ok(())
}

/// Apply `delta` to tier points and available points, both floored at 0.
/// Positive deltas also count as lifetime earnings.
pub fn adjust_full(
    membership: &mut Membership,
    request: &AdjustPoints,
    now: i64,
) -> LedgerResult<()> {
    let delta = nonzero(request.delta)?;

    membership.tier_points = membership.tier_points.saturating_add(delta).max(0);
    membership.available_points = membership.available_points.saturating_add(delta).max(0);
    if delta > 0 {
        membership.lifetime_points_earned =
            membership.lifetime_points_earned.saturating_add(delta);
    }

    record_adjustment(membership, request, AdjustmentScope::Full, now);
    Ok(())
}

/// Apply `delta` to available points only, floored at 0.
pub fn adjust_redeemable_only(
    membership: &mut Membership,
    request: &AdjustPoints,
    now: i64,
) -> LedgerResult<()> {
    let delta = nonzero(request.delta)?;

    membership.available_points = membership.available_points.saturating_add(delta).max(0);

    record_adjustment(membership, request, AdjustmentScope::RedeemableOnly, now);
    Ok(())
}

/// Re-derive tier and progress from tier points.
///
/// A tier change is appended to the tier history. Progress is refreshed
/// either way, measured from the band of the resulting tier.
pub fn recompute_tier(membership: &mut Membership, policy: &TierPolicy, now: i64) -> TierOutcome {
    let previous = membership.tier;
    let current = policy.resolve(previous, membership.tier_points);

    if current != previous {
        let reason = if current > previous {
            format!("Upgraded at {} tier points", membership.tier_points)
        } else {
            format!("Demoted at {} tier points", membership.tier_points)
        };
        membership.tier = current;
        membership.tier_history.push(TierChange {
            tier: current,
            changed_at: now,
            reason,
        });
    }
    membership.tier_progress = policy.table.progress_for(current, membership.tier_points);
    TierOutcome { previous, current }
}

fn nonzero(delta: i64) -> LedgerResult<i64> {
    if delta == 0 {
        return Err(LedgerError::InvalidAmount(delta));
    }
    Ok(delta)
}

fn record_adjustment(
    membership: &mut Membership,
    request: &AdjustPoints,
    scope: AdjustmentScope,
    now: i64,
) {
    membership.points_history.push(PointsActivity {
        kind: PointsActivityKind::Adjusted {
            kind: AdjustmentKind::from_delta(request.delta),
            scope,
        },
        points: request.delta,
        description: request.reason.clone(),
        reference: None,
        note: request.note.clone(),
        occurred_at: now,
    });
    membership.last_activity_at = Some(now);
}
