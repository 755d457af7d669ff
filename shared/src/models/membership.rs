//! Loyalty Membership Model

use serde::{Deserialize, Serialize};

use super::tier::{Tier, TierProgress};
use crate::util::normalize_email;

/// An earn lot (积分批次): the points of one earn event with its own expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarnLot {
    pub points: i64,
    pub description: String,
    pub earned_at: i64,
    pub expires_at: i64,
    pub source_ref: Option<String>,
    /// Property where the points were earned (differs from the owner property in a group)
    pub property_id: Option<String>,
    pub is_expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionStatus {
    Applied,
}

/// Redemption record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub points: i64,
    /// Monetary value of the reward
    pub value: f64,
    pub reward_ref: Option<String>,
    pub reward_name: String,
    pub source_ref: Option<String>,
    pub redeemed_at: i64,
    pub status: RedemptionStatus,
}

/// Direction of an administrative adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentKind {
    Increase,
    Decrease,
}

impl AdjustmentKind {
    pub fn from_delta(delta: i64) -> Self {
        if delta >= 0 {
            Self::Increase
        } else {
            Self::Decrease
        }
    }
}

/// Which balances an administrative adjustment touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentScope {
    /// Tier points and available points
    Full,
    /// Available points only
    RedeemableOnly,
}

/// Kind of a points history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointsActivityKind {
    Earned,
    Redeemed,
    Adjusted {
        kind: AdjustmentKind,
        scope: AdjustmentScope,
    },
    Expired,
}

/// Points history entry (积分流水). `points` is signed: negative for
/// redemptions, expirations and decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsActivity {
    pub kind: PointsActivityKind,
    pub points: i64,
    pub description: String,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub occurred_at: i64,
}

/// Tier change record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierChange {
    pub tier: Tier,
    pub changed_at: i64,
    pub reason: String,
}

/// A guest account at one property, linked into a group membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub property_id: String,
    pub guest_account_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub linked_at: i64,
}

/// Set of linked accounts keyed by `(property_id, guest_account_id)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkedAccounts(Vec<LinkedAccount>);

impl LinkedAccounts {
    pub fn contains(&self, property_id: &str, guest_account_id: &str) -> bool {
        self.0
            .iter()
            .any(|a| a.property_id == property_id && a.guest_account_id == guest_account_id)
    }

    /// Insert unless the pair is already present. Returns `true` if inserted.
    pub fn insert(&mut self, account: LinkedAccount) -> bool {
        if self.contains(&account.property_id, &account.guest_account_id) {
            return false;
        }
        self.0.push(account);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkedAccount> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Membership aggregate (会员积分账户)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub guest_id: String,
    pub property_id: String,
    pub group_id: Option<String>,
    /// Lowercased
    pub guest_email: Option<String>,

    pub tier: Tier,
    /// Only used for tier computation, never reduced by redemption
    pub tier_points: i64,
    /// Redeemable balance
    pub available_points: i64,
    /// Lifetime display counter (earning minus expiration)
    pub total_points: i64,

    pub lifetime_spending: f64,
    pub lifetime_points_earned: i64,
    pub lifetime_points_redeemed: i64,
    pub total_nights_stayed: i64,

    pub tier_progress: TierProgress,

    pub earn_history: Vec<EarnLot>,
    pub redemption_history: Vec<Redemption>,
    pub points_history: Vec<PointsActivity>,
    pub tier_history: Vec<TierChange>,
    pub linked_accounts: LinkedAccounts,

    pub last_activity_at: Option<i64>,
    pub joined_at: i64,
    pub is_active: bool,
}

impl Membership {
    /// Fresh membership: Bronze, zero balances
    pub fn new(guest_id: impl Into<String>, property_id: impl Into<String>, now: i64) -> Self {
        Self {
            guest_id: guest_id.into(),
            property_id: property_id.into(),
            group_id: None,
            guest_email: None,
            tier: Tier::Bronze,
            tier_points: 0,
            available_points: 0,
            total_points: 0,
            lifetime_spending: 0.0,
            lifetime_points_earned: 0,
            lifetime_points_redeemed: 0,
            total_nights_stayed: 0,
            tier_progress: TierProgress::default(),
            earn_history: Vec::new(),
            redemption_history: Vec::new(),
            points_history: Vec::new(),
            tier_history: Vec::new(),
            linked_accounts: LinkedAccounts::default(),
            last_activity_at: None,
            joined_at: now,
            is_active: true,
        }
    }

    pub fn is_group_scoped(&self) -> bool {
        self.group_id.is_some()
    }

    pub fn balance(&self) -> PointsBalance {
        PointsBalance {
            tier: self.tier,
            tier_points: self.tier_points,
            available_points: self.available_points,
            total_points: self.total_points,
            lifetime_points_earned: self.lifetime_points_earned,
            lifetime_points_redeemed: self.lifetime_points_redeemed,
            tier_progress: self.tier_progress.clone(),
        }
    }
}

/// Balance snapshot returned after ledger operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBalance {
    pub tier: Tier,
    pub tier_points: i64,
    pub available_points: i64,
    pub total_points: i64,
    pub lifetime_points_earned: i64,
    pub lifetime_points_redeemed: i64,
    pub tier_progress: TierProgress,
}

/// The acting guest as seen by a caller: an account at one property,
/// optionally inside an ownership group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestIdentity {
    pub guest_id: String,
    pub property_id: String,
    pub group_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl GuestIdentity {
    pub fn new(guest_id: impl Into<String>, property_id: impl Into<String>) -> Self {
        Self {
            guest_id: guest_id.into(),
            property_id: property_id.into(),
            group_id: None,
            email: None,
            display_name: None,
        }
    }

    pub fn in_group(mut self, group_id: impl Into<String>, email: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// `(group_id, normalized email)` when the guest acts inside a group.
    /// Grouping needs both; a guest without an email stays per-property.
    pub fn group_scope(&self) -> Option<(&str, String)> {
        match (&self.group_id, &self.email) {
            (Some(group), Some(email)) if !group.is_empty() && !email.trim().is_empty() => {
                Some((group.as_str(), normalize_email(email)))
            }
            _ => None,
        }
    }
}
