//! Expiration Sweep for one membership
//!
//! Two phases: collect the indices of due lots, then retire them. The earn
//! history is never appended to while it is being scanned.
//!
//! Redemption spends from the aggregate balance, not from specific lots, so
//! a lot may already be (partly) spent when it expires. Its face value is
//! still reclaimed and the balances are clamped at zero; the shortfall is
//! logged.

use shared::models::{Membership, PointsActivity, PointsActivityKind};

/// Retire every unexpired lot with `expires_at <= now` and return the sum of
/// their face values. Tier points are never touched. Calling it again with
/// nothing newly due returns 0 and changes nothing.
pub fn expire(membership: &mut Membership, now: i64) -> i64 {
    let due: Vec<usize> = membership
        .earn_history
        .iter()
        .enumerate()
        .filter(|(_, lot)| !lot.is_expired && lot.expires_at <= now)
        .map(|(index, _)| index)
        .collect();

    if due.is_empty() {
        return 0;
    }

    let mut expired_total: i64 = 0;
    let mut entries = Vec::with_capacity(due.len());
    for index in due {
        let lot = &mut membership.earn_history[index];
        lot.is_expired = true;
        expired_total = expired_total.saturating_add(lot.points);
        entries.push(PointsActivity {
            kind: PointsActivityKind::Expired,
            points: -lot.points,
            description: format!("Expired: {}", lot.description),
            reference: lot.source_ref.clone(),
            note: None,
            occurred_at: now,
        });
    }
    membership.points_history.extend(entries);

    let shortfall = (expired_total - membership.available_points).max(0);
    if shortfall > 0 {
        tracing::warn!(
            guest_id = %membership.guest_id,
            property_id = %membership.property_id,
            expired_total,
            available_points = membership.available_points,
            shortfall,
            "Expired lots exceed available balance, clamping at zero"
        );
    }

    membership.available_points = (membership.available_points - expired_total).max(0);
    membership.total_points = (membership.total_points - expired_total).max(0);
    membership.last_activity_at = Some(now);

    expired_total
}
