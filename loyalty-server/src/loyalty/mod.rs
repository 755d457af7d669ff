//! Loyalty ledger domain
//!
//! Pure functions over a [`Membership`](shared::models::Membership); nothing
//! here touches the database or a clock. `now` is always passed in.
//!
//! - [`tier_policy`] - tier thresholds and progress
//! - [`ledger`] - earn / redeem / adjust / recompute tier
//! - [`expiration`] - retiring expired earn lots
//! - [`linker`] - cross-property account linking
//! - [`error`] - [`LedgerError`]

pub mod error;
pub mod expiration;
pub mod ledger;
pub mod linker;
pub mod tier_policy;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{AdjustPoints, DEFAULT_EXPIRATION_MONTHS, EarnPoints, RedeemPoints, TierOutcome};
pub use linker::LinkRequest;
pub use tier_policy::{TierPolicy, TierTable};
