mod common;

use common::{DAY_MS, T0, guest, harness, harness_with};
use loyalty_server::LedgerError;
use loyalty_server::loyalty::{AdjustPoints, EarnPoints, LinkRequest, RedeemPoints, TierPolicy, TierTable};
use loyalty_server::services::LedgerSettings;
use shared::models::{PointsActivityKind, RedemptionStatus, Tier};

// ========== Earn / redeem / expire / adjust walkthrough ==========

#[tokio::test]
async fn test_earn_on_fresh_membership() {
    let h = harness().await;
    let ana = guest("ana", "p-1");

    let receipt = h
        .store
        .earn(&ana, &EarnPoints::new(100, "Stay").expiring_in(12))
        .await
        .unwrap();

    assert_eq!(receipt.balance.tier_points, 100);
    assert_eq!(receipt.balance.available_points, 100);
    assert_eq!(receipt.balance.total_points, 100);
    assert!(!receipt.tier_upgraded);

    let m = h.store.find(&ana).await.unwrap();
    assert_eq!(m.earn_history.len(), 1);
    assert_eq!(m.joined_at, T0);
}

#[tokio::test]
async fn test_redeem_keeps_tier_points() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    h.store
        .earn(&ana, &EarnPoints::new(100, "Stay").expiring_in(12))
        .await
        .unwrap();

    let receipt = h
        .store
        .redeem(&ana, &RedeemPoints::new(40, 4.0, "Free Coffee"))
        .await
        .unwrap();
    assert_eq!(receipt.balance.available_points, 60);
    assert_eq!(receipt.balance.tier_points, 100);

    let m = h.store.find(&ana).await.unwrap();
    assert_eq!(m.redemption_history.len(), 1);
    assert_eq!(m.redemption_history[0].status, RedemptionStatus::Applied);
    assert_eq!(m.redemption_history[0].reward_name, "Free Coffee");
}

#[tokio::test]
async fn test_overdraw_leaves_balances_untouched() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    h.store.earn(&ana, &EarnPoints::new(100, "Stay")).await.unwrap();
    h.store
        .redeem(&ana, &RedeemPoints::new(40, 4.0, "Free Coffee"))
        .await
        .unwrap();
    let before = h.store.find(&ana).await.unwrap();

    let err = h
        .store
        .redeem(&ana, &RedeemPoints::new(100, 10.0, "Suite Upgrade"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientPoints {
            requested: 100,
            available: 60
        }
    ));

    let after = h.store.find(&ana).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_expire_reclaims_face_value_and_clamps() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    h.store
        .earn(&ana, &EarnPoints::new(100, "Stay").expiring_in(12))
        .await
        .unwrap();
    h.store
        .redeem(&ana, &RedeemPoints::new(40, 4.0, "Free Coffee"))
        .await
        .unwrap();

    h.clock.advance(400 * DAY_MS);
    let expired = h.store.expire(&ana).await.unwrap();
    assert_eq!(expired, 100);

    let balance = h.store.balance(&ana).await.unwrap();
    assert_eq!(balance.available_points, 0);
    assert_eq!(balance.total_points, 0);
    assert_eq!(balance.tier_points, 100);

    // Nothing newly due
    assert_eq!(h.store.expire(&ana).await.unwrap(), 0);
    assert_eq!(h.store.balance(&ana).await.unwrap(), balance);
}

#[tokio::test]
async fn test_redeemable_only_adjustment_after_expiry() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    h.store
        .earn(&ana, &EarnPoints::new(100, "Stay").expiring_in(12))
        .await
        .unwrap();
    h.store
        .redeem(&ana, &RedeemPoints::new(40, 4.0, "Free Coffee"))
        .await
        .unwrap();
    h.clock.advance(400 * DAY_MS);
    h.store.expire(&ana).await.unwrap();

    let receipt = h
        .store
        .adjust_redeemable_only(&ana, &AdjustPoints::new(20, "goodwill credit"))
        .await
        .unwrap();
    assert_eq!(receipt.balance.available_points, 20);
    assert_eq!(receipt.balance.tier_points, 100);
    assert_eq!(receipt.balance.total_points, 0);

    let m = h.store.find(&ana).await.unwrap();
    let last = m.points_history.last().unwrap();
    assert!(matches!(last.kind, PointsActivityKind::Adjusted { .. }));
    assert_eq!(last.description, "goodwill credit");
}

// ========== Validation ==========

#[tokio::test]
async fn test_invalid_amounts_do_not_create_membership() {
    let h = harness().await;
    let ana = guest("ana", "p-1");

    let err = h.store.earn(&ana, &EarnPoints::new(0, "Nothing")).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(0)));
    let err = h
        .store
        .redeem(&ana, &RedeemPoints::new(-5, 0.0, "Oops"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(-5)));

    assert!(matches!(
        h.store.find(&ana).await,
        Err(LedgerError::MembershipNotFound(_))
    ));
}

#[tokio::test]
async fn test_expire_unknown_guest_is_zero() {
    let h = harness().await;
    assert_eq!(h.store.expire(&guest("nobody", "p-1")).await.unwrap(), 0);
}

// ========== Tiers ==========

#[tokio::test]
async fn test_earn_upgrades_tier() {
    let h = harness().await;
    let ana = guest("ana", "p-1");

    let receipt = h.store.earn(&ana, &EarnPoints::new(999, "Stay")).await.unwrap();
    assert_eq!(receipt.balance.tier, Tier::Bronze);
    assert_eq!(receipt.balance.tier_progress.points_to_next_tier, 1);

    let receipt = h.store.earn(&ana, &EarnPoints::new(1, "Stay")).await.unwrap();
    assert!(receipt.tier_upgraded);
    assert_eq!(receipt.balance.tier, Tier::Silver);
    assert_eq!(receipt.balance.tier_progress.next_tier, Some(Tier::Gold));

    let m = h.store.find(&ana).await.unwrap();
    assert_eq!(m.tier_history.len(), 1);
    assert_eq!(m.tier_history[0].tier, Tier::Silver);
}

#[tokio::test]
async fn test_adjust_full_keeps_tier_without_demotion() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    h.store.earn(&ana, &EarnPoints::new(5_000, "Stay")).await.unwrap();

    let receipt = h
        .store
        .adjust_full(&ana, &AdjustPoints::new(-4_500, "chargeback"))
        .await
        .unwrap();
    assert_eq!(receipt.balance.tier_points, 500);
    assert_eq!(receipt.balance.available_points, 500);
    assert_eq!(receipt.balance.tier, Tier::Gold);
}

#[tokio::test]
async fn test_adjust_full_demotes_when_allowed() {
    let policy = TierPolicy::new(TierTable::standard(), true);
    let h = harness_with(policy, LedgerSettings::default()).await;
    let ana = guest("ana", "p-1");
    h.store.earn(&ana, &EarnPoints::new(5_000, "Stay")).await.unwrap();

    let receipt = h
        .store
        .adjust_full(&ana, &AdjustPoints::new(-9_000, "chargeback"))
        .await
        .unwrap();
    assert_eq!(receipt.balance.tier_points, 0);
    assert_eq!(receipt.balance.available_points, 0);
    assert_eq!(receipt.balance.tier, Tier::Bronze);
}

#[tokio::test]
async fn test_recompute_with_custom_table() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    h.store.earn(&ana, &EarnPoints::new(150, "Stay")).await.unwrap();

    let table = TierTable::from_minimums(&[0, 50, 100, 200]).unwrap();
    let outcome = h.store.recompute_tier(&ana, Some(&table)).await.unwrap();
    assert_eq!(outcome.previous, Tier::Bronze);
    assert_eq!(outcome.current, Tier::Gold);
    assert!(outcome.upgraded());

    // Standard table would say Bronze, but the achieved tier is kept
    let outcome = h.store.recompute_tier(&ana, None).await.unwrap();
    assert_eq!(outcome.current, Tier::Gold);
    assert!(!outcome.changed());
}

#[tokio::test]
async fn test_recompute_requires_membership() {
    let h = harness().await;
    let err = h
        .store
        .recompute_tier(&guest("nobody", "p-1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MembershipNotFound(_)));
}

// ========== Enrollment / lifecycle ==========

#[tokio::test]
async fn test_enroll_twice_is_duplicate() {
    let h = harness().await;
    let ana = guest("ana", "p-1");

    let m = h.store.enroll(&ana).await.unwrap();
    assert_eq!(m.tier, Tier::Bronze);
    assert_eq!(m.tier_progress.points_to_next_tier, 1_000);

    let err = h.store.enroll(&ana).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateMembership(_)));
}

#[tokio::test]
async fn test_deactivated_membership_rejects_writes() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    h.store.earn(&ana, &EarnPoints::new(100, "Stay")).await.unwrap();

    assert!(h.store.deactivate(&ana).await.unwrap());
    assert!(!h.store.deactivate(&ana).await.unwrap());

    let err = h.store.earn(&ana, &EarnPoints::new(10, "Stay")).await.unwrap_err();
    assert!(matches!(err, LedgerError::MembershipInactive(_)));

    // History stays readable
    let m = h.store.find(&ana).await.unwrap();
    assert!(!m.is_active);
    assert_eq!(m.available_points, 100);
}

#[tokio::test]
async fn test_sweep_reports_expired_memberships() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    let ben = guest("ben", "p-1");
    let cy = guest("cy", "p-2");
    h.store
        .earn(&ana, &EarnPoints::new(100, "Stay").expiring_in(1))
        .await
        .unwrap();
    h.store
        .earn(&ben, &EarnPoints::new(50, "Stay").expiring_in(1))
        .await
        .unwrap();
    h.store
        .earn(&cy, &EarnPoints::new(70, "Stay").expiring_in(24))
        .await
        .unwrap();
    h.store.deactivate(&cy).await.unwrap();

    h.clock.advance(40 * DAY_MS);
    let report = h.store.expire_all().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.affected, 2);
    assert_eq!(report.points_expired, 150);
    assert_eq!(report.failed, 0);

    let again = h.store.expire_all().await.unwrap();
    assert_eq!(again.affected, 0);
    assert_eq!(again.points_expired, 0);
}

// ========== Group routing and linking ==========

#[tokio::test]
async fn test_group_guest_shares_one_membership_across_properties() {
    let h = harness().await;
    let at_p1 = guest("ana-1", "p-1").in_group("grp", "ana@example.com");
    let at_p2 = guest("ana-2", "p-2").in_group("grp", " ANA@example.com ");

    h.store.earn(&at_p1, &EarnPoints::new(100, "Stay")).await.unwrap();
    let receipt = h.store.earn(&at_p2, &EarnPoints::new(50, "Stay")).await.unwrap();
    assert_eq!(receipt.balance.tier_points, 150);

    let m = h.store.find(&at_p2).await.unwrap();
    assert_eq!(m.guest_id, "ana-1");
    assert_eq!(m.group_id.as_deref(), Some("grp"));
    assert!(m.linked_accounts.contains("p-1", "ana-1"));
    assert!(m.linked_accounts.contains("p-2", "ana-2"));

    // Plain per-property lookup through the linked account
    let linked = h.store.balance(&guest("ana-2", "p-2")).await.unwrap();
    assert_eq!(linked.available_points, 150);

    let properties = h.store.linked_properties(&at_p1).await.unwrap();
    assert_eq!(properties.into_iter().collect::<Vec<_>>(), vec!["p-1", "p-2"]);
}

#[tokio::test]
async fn test_ungrouped_membership_is_adopted_by_group() {
    let h = harness().await;
    h.store
        .earn(&guest("ana", "p-1"), &EarnPoints::new(80, "Stay"))
        .await
        .unwrap();

    let grouped = guest("ana", "p-1").in_group("grp", "ana@example.com");
    let receipt = h.store.earn(&grouped, &EarnPoints::new(20, "Stay")).await.unwrap();
    assert_eq!(receipt.balance.available_points, 100);

    let m = h.store.find(&grouped).await.unwrap();
    assert!(m.is_group_scoped());
    assert_eq!(m.guest_email.as_deref(), Some("ana@example.com"));
}

#[tokio::test]
async fn test_link_account_is_deduplicated() {
    let h = harness().await;
    let ana = guest("ana", "p-1").in_group("grp", "ana@example.com");
    h.store.enroll(&ana).await.unwrap();

    let request = LinkRequest::new("p-9", "acct-9").with_display_name("Ana");
    assert!(h.store.link_account(&ana, &request).await.unwrap());
    assert!(!h.store.link_account(&ana, &request).await.unwrap());

    assert!(h.store.is_linked(&ana, "p-9", "acct-9").await.unwrap());
    assert!(!h.store.is_linked(&ana, "p-9", "acct-8").await.unwrap());
    let m = h.store.find(&ana).await.unwrap();
    assert_eq!(m.linked_accounts.len(), 2);

    // The linked account now resolves to the group membership
    h.store
        .earn(&guest("acct-9", "p-9"), &EarnPoints::new(30, "Stay"))
        .await
        .unwrap();
    assert_eq!(h.store.balance(&ana).await.unwrap().available_points, 30);
}

#[tokio::test]
async fn test_link_requires_group_membership() {
    let h = harness().await;
    let ana = guest("ana", "p-1");
    h.store.enroll(&ana).await.unwrap();

    let err = h
        .store
        .link_account(&ana, &LinkRequest::new("p-2", "acct-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotGroupScoped(_)));
    assert!(h.store.linked_properties(&ana).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expire_does_not_link_the_caller() {
    let h = harness().await;
    let at_p1 = guest("ana-1", "p-1").in_group("grp", "ana@example.com");
    let at_p2 = guest("ana-2", "p-2").in_group("grp", "ana@example.com");
    h.store
        .earn(&at_p1, &EarnPoints::new(40, "Stay").expiring_in(1))
        .await
        .unwrap();

    assert_eq!(h.store.expire(&at_p2).await.unwrap(), 0);
    h.clock.advance(60 * DAY_MS);
    assert_eq!(h.store.expire(&at_p2).await.unwrap(), 40);

    assert!(!h.store.is_linked(&at_p1, "p-2", "ana-2").await.unwrap());
    let m = h.store.find(&at_p1).await.unwrap();
    assert_eq!(m.linked_accounts.len(), 1);
    assert_eq!(m.available_points, 0);
}
