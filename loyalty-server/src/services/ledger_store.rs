//! Ledger Store
//!
//! Persistence and concurrency boundary around the membership aggregate.
//!
//! # Key resolution
//!
//! For an acting [`GuestIdentity`]:
//! 1. grouped guest (group id + email): the canonical `(group, email)` membership
//! 2. an account linked into some group membership: that membership
//! 3. otherwise the `(guest, property)` membership, created on first write
//!
//! # Concurrency
//!
//! Every mutation is load → apply → versioned save, run while holding the
//! in-process lock of the membership's key. A save that loses the version
//! race (another process, or a first insert racing another) is retried from
//! a fresh load, up to `max_attempts`, then reported as
//! [`LedgerError::ConcurrencyConflict`].

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use shared::models::{GuestIdentity, LinkedAccount, Membership, PointsBalance};
use shared::util::normalize_email;
use sqlx::SqlitePool;

use crate::db::repository::membership::{self as repo, StoredMembership};
use crate::db::repository::RepoError;
use crate::loyalty::ledger::{self, AdjustPoints, EarnPoints, RedeemPoints, TierOutcome};
use crate::loyalty::{LedgerError, LedgerResult, LinkRequest, TierPolicy, TierTable, expiration, linker};
use crate::services::keyed_locks::KeyedLocks;
use crate::utils::Clock;

/// Tunables of the store
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Load/apply/save attempts before giving up with a conflict
    pub max_attempts: u32,
    /// Lot lifetime when an earn request does not set one
    pub default_expiration_months: u32,
    /// Memberships expired in parallel by [`LedgerStore::expire_all`]
    pub sweep_concurrency: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            default_expiration_months: ledger::DEFAULT_EXPIRATION_MONTHS,
            sweep_concurrency: 8,
        }
    }
}

/// Balances after a mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerReceipt {
    pub balance: PointsBalance,
    pub tier_upgraded: bool,
}

/// Outcome of a full expiration sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Active memberships visited
    pub scanned: usize,
    /// Memberships that had at least one lot expire
    pub affected: usize,
    pub points_expired: i64,
    /// Memberships whose expiration failed
    pub failed: usize,
}

/// What a mutation is addressed to
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Identity(&'a GuestIdentity),
    Id(i64),
}

/// How a mutation treats missing or retired memberships
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Create the membership if missing; must be active
    Write,
    /// Must exist and be active
    Existing,
    /// Must exist; inactive is fine
    Retire,
    /// Must exist and be active; the caller's identity is not attached
    Sweep,
}

pub struct LedgerStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
    policy: TierPolicy,
    settings: LedgerSettings,
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore")
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LedgerStore {
    pub fn new(
        pool: SqlitePool,
        clock: Arc<dyn Clock>,
        policy: TierPolicy,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            pool,
            clock,
            locks: KeyedLocks::new(),
            policy,
            settings,
        }
    }

    // ========== Reads ==========

    /// The membership the identity resolves to
    pub async fn find(&self, identity: &GuestIdentity) -> LedgerResult<Membership> {
        self.locate(Target::Identity(identity))
            .await?
            .map(|stored| stored.membership)
            .ok_or_else(|| LedgerError::MembershipNotFound(identity_key(identity)))
    }

    pub async fn balance(&self, identity: &GuestIdentity) -> LedgerResult<PointsBalance> {
        Ok(self.find(identity).await?.balance())
    }

    /// Whether the `(property, account)` pair is linked into the identity's membership
    pub async fn is_linked(
        &self,
        identity: &GuestIdentity,
        property_id: &str,
        guest_account_id: &str,
    ) -> LedgerResult<bool> {
        Ok(self
            .locate(Target::Identity(identity))
            .await?
            .is_some_and(|stored| {
                linker::is_linked(&stored.membership, property_id, guest_account_id)
            }))
    }

    pub async fn linked_properties(
        &self,
        identity: &GuestIdentity,
    ) -> LedgerResult<BTreeSet<String>> {
        Ok(self
            .locate(Target::Identity(identity))
            .await?
            .map(|stored| linker::linked_properties(&stored.membership))
            .unwrap_or_default())
    }

    // ========== Mutations ==========

    /// Create the membership explicitly. Fails if the identity already
    /// resolves to one.
    pub async fn enroll(&self, identity: &GuestIdentity) -> LedgerResult<Membership> {
        let key = identity_key(identity);
        let _guard = self.locks.lock(&key).await;

        if self.locate(Target::Identity(identity)).await?.is_some() {
            return Err(LedgerError::DuplicateMembership(key));
        }

        let now = self.clock.now_millis();
        let mut membership = self.new_membership(identity, now);
        attach_identity(&mut membership, identity, now);

        match repo::insert(&self.pool, &membership).await {
            Ok(stored) => {
                tracing::info!(
                    membership_id = stored.id,
                    guest_id = %identity.guest_id,
                    property_id = %identity.property_id,
                    group_id = ?membership.group_id,
                    "Membership enrolled"
                );
                Ok(stored.membership)
            }
            Err(RepoError::Duplicate(_)) => Err(LedgerError::DuplicateMembership(key)),
            Err(e) => Err(e.into()),
        }
    }

    /// Earn points and recompute the tier
    pub async fn earn(
        &self,
        identity: &GuestIdentity,
        request: &EarnPoints,
    ) -> LedgerResult<LedgerReceipt> {
        let default_months = self.settings.default_expiration_months;
        let (membership, outcome) = self
            .mutate(Target::Identity(identity), "earn", Access::Write, |m, now| {
                ledger::earn(m, request, default_months, now)?;
                Ok(ledger::recompute_tier(m, &self.policy, now))
            })
            .await?;
        log_tier_change(&membership, &outcome);
        Ok(receipt(&membership, outcome.upgraded()))
    }

    pub async fn redeem(
        &self,
        identity: &GuestIdentity,
        request: &RedeemPoints,
    ) -> LedgerResult<LedgerReceipt> {
        let (membership, ()) = self
            .mutate(Target::Identity(identity), "redeem", Access::Write, |m, now| {
                ledger::redeem(m, request, now)
            })
            .await?;
        Ok(receipt(&membership, false))
    }

    /// Adjust tier and available points, then recompute the tier
    pub async fn adjust_full(
        &self,
        identity: &GuestIdentity,
        request: &AdjustPoints,
    ) -> LedgerResult<LedgerReceipt> {
        let (membership, outcome) = self
            .mutate(Target::Identity(identity), "adjust_full", Access::Write, |m, now| {
                ledger::adjust_full(m, request, now)?;
                Ok(ledger::recompute_tier(m, &self.policy, now))
            })
            .await?;
        log_tier_change(&membership, &outcome);
        Ok(receipt(&membership, outcome.upgraded()))
    }

    pub async fn adjust_redeemable_only(
        &self,
        identity: &GuestIdentity,
        request: &AdjustPoints,
    ) -> LedgerResult<LedgerReceipt> {
        let (membership, ()) = self
            .mutate(
                Target::Identity(identity),
                "adjust_redeemable_only",
                Access::Write,
                |m, now| ledger::adjust_redeemable_only(m, request, now),
            )
            .await?;
        Ok(receipt(&membership, false))
    }

    /// Recompute the tier against `table`, or the configured table when `None`.
    /// The configured demotion rule applies either way.
    pub async fn recompute_tier(
        &self,
        identity: &GuestIdentity,
        table: Option<&TierTable>,
    ) -> LedgerResult<TierOutcome> {
        let policy = match table {
            Some(table) => TierPolicy::new(table.clone(), self.policy.allow_demotion),
            None => self.policy.clone(),
        };
        let (membership, outcome) = self
            .mutate(
                Target::Identity(identity),
                "recompute_tier",
                Access::Existing,
                |m, now| Ok(ledger::recompute_tier(m, &policy, now)),
            )
            .await?;
        log_tier_change(&membership, &outcome);
        Ok(outcome)
    }

    /// Retire due lots of one membership. A guest without a membership has
    /// nothing to expire.
    pub async fn expire(&self, identity: &GuestIdentity) -> LedgerResult<i64> {
        match self.expire_target(Target::Identity(identity)).await {
            Err(LedgerError::MembershipNotFound(_)) => Ok(0),
            other => other,
        }
    }

    /// Expire every active membership, `sweep_concurrency` at a time
    pub async fn expire_all(&self) -> LedgerResult<SweepReport> {
        let ids = repo::list_active_ids(&self.pool).await?;
        let concurrency = self.settings.sweep_concurrency.max(1);
        tracing::info!(memberships = ids.len(), concurrency, "Expiration sweep started");

        let tasks: Vec<_> = ids.into_iter().map(|id| self.expire_id(id)).collect();
        let results: Vec<(i64, LedgerResult<i64>)> = stream::iter(tasks)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = SweepReport::default();
        for (id, result) in results {
            match result {
                Ok(expired) => {
                    report.scanned += 1;
                    if expired > 0 {
                        report.affected += 1;
                        report.points_expired += expired;
                    }
                }
                // Retired after the id list was read
                Err(LedgerError::MembershipInactive(_)) => {}
                Err(e) => {
                    report.scanned += 1;
                    report.failed += 1;
                    tracing::error!(membership_id = id, error = %e, "Expiration failed");
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            affected = report.affected,
            points_expired = report.points_expired,
            failed = report.failed,
            "Expiration sweep finished"
        );
        Ok(report)
    }

    /// Link an account into the identity's group membership.
    /// Returns `false` if it was already linked.
    pub async fn link_account(
        &self,
        identity: &GuestIdentity,
        request: &LinkRequest,
    ) -> LedgerResult<bool> {
        let (_, inserted) = self
            .mutate(Target::Identity(identity), "link_account", Access::Write, |m, now| {
                linker::link_account(m, request, now)
            })
            .await?;
        if inserted {
            tracing::info!(
                guest_id = %identity.guest_id,
                linked_property_id = %request.property_id,
                guest_account_id = %request.guest_account_id,
                "Account linked"
            );
        }
        Ok(inserted)
    }

    /// Retire the membership. History is kept. Returns `false` if it was
    /// already inactive.
    pub async fn deactivate(&self, identity: &GuestIdentity) -> LedgerResult<bool> {
        let (_, changed) = self
            .mutate(Target::Identity(identity), "deactivate", Access::Retire, |m, _| {
                let was_active = m.is_active;
                m.is_active = false;
                Ok(was_active)
            })
            .await?;
        if changed {
            tracing::info!(guest_id = %identity.guest_id, property_id = %identity.property_id, "Membership deactivated");
        }
        Ok(changed)
    }

    /// Forget lock entries nobody is using
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }

    // ========== Internals ==========

    async fn expire_target(&self, target: Target<'_>) -> LedgerResult<i64> {
        let (_, expired) = self
            .mutate(target, "expire", Access::Sweep, |m, now| {
                Ok(expiration::expire(m, now))
            })
            .await?;
        Ok(expired)
    }

    async fn expire_id(&self, id: i64) -> (i64, LedgerResult<i64>) {
        (id, self.expire_target(Target::Id(id)).await)
    }

    async fn locate(&self, target: Target<'_>) -> LedgerResult<Option<StoredMembership>> {
        let identity = match target {
            Target::Id(id) => return Ok(repo::find_by_id(&self.pool, id).await?),
            Target::Identity(identity) => identity,
        };

        if let Some((group_id, email)) = identity.group_scope()
            && let Some(stored) = repo::find_by_group(&self.pool, group_id, &email).await?
        {
            return Ok(Some(stored));
        }
        if let Some(stored) =
            repo::find_by_linked_account(&self.pool, &identity.property_id, &identity.guest_id)
                .await?
        {
            return Ok(Some(stored));
        }
        Ok(repo::find_by_guest(&self.pool, &identity.guest_id, &identity.property_id).await?)
    }

    fn new_membership(&self, identity: &GuestIdentity, now: i64) -> Membership {
        let mut membership = Membership::new(&identity.guest_id, &identity.property_id, now);
        membership.guest_email = identity.email.as_deref().map(normalize_email);
        if let Some((group_id, _)) = identity.group_scope() {
            membership.group_id = Some(group_id.to_string());
        }
        membership.tier_progress = self.policy.table.progress_for(membership.tier, 0);
        membership
    }

    /// Run `apply` against the target membership and persist the result.
    ///
    /// `apply` may run more than once; it always sees a fresh copy. An
    /// error from `apply` aborts without saving.
    async fn mutate<T, F>(
        &self,
        target: Target<'_>,
        op: &'static str,
        access: Access,
        mut apply: F,
    ) -> LedgerResult<(Membership, T)>
    where
        F: FnMut(&mut Membership, i64) -> LedgerResult<T>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut key = target_key(target);

        for attempt in 1..=max_attempts {
            let located = self.locate(target).await?;
            key = located
                .as_ref()
                .map(|stored| membership_key(&stored.membership))
                .unwrap_or_else(|| target_key(target));
            let _guard = self.locks.lock(&key).await;

            // Re-read under the lock; another task may have saved meanwhile
            let stored = match located {
                Some(stored) => repo::find_by_id(&self.pool, stored.id).await?,
                None => None,
            };

            let now = self.clock.now_millis();
            let mut membership = match (&stored, target) {
                (Some(stored), _) => stored.membership.clone(),
                (None, Target::Identity(identity)) if access == Access::Write => {
                    self.new_membership(identity, now)
                }
                (None, _) => return Err(LedgerError::MembershipNotFound(key)),
            };

            if !membership.is_active && access != Access::Retire {
                return Err(LedgerError::MembershipInactive(key));
            }
            if let Target::Identity(identity) = target
                && access != Access::Sweep
            {
                attach_identity(&mut membership, identity, now);
            }

            let value = apply(&mut membership, now)?;

            let saved = match &stored {
                Some(stored) if stored.membership == membership => {
                    tracing::debug!(key = %key, op, "Ledger mutation left membership unchanged");
                    return Ok((membership, value));
                }
                Some(stored) => repo::update(&self.pool, stored.id, stored.version, &membership)
                    .await
                    .map(|version| (stored.id, version)),
                None => repo::insert(&self.pool, &membership)
                    .await
                    .map(|inserted| (inserted.id, inserted.version)),
            };

            match saved {
                Ok((membership_id, version)) => {
                    tracing::debug!(
                        key = %key,
                        op,
                        membership_id,
                        version,
                        available_points = membership.available_points,
                        tier_points = membership.tier_points,
                        "Ledger mutation saved"
                    );
                    return Ok((membership, value));
                }
                Err(RepoError::VersionConflict(reason)) | Err(RepoError::Duplicate(reason)) => {
                    tracing::warn!(
                        key = %key,
                        op,
                        attempt,
                        max_attempts,
                        reason = %reason,
                        "Ledger save lost a race, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(key = %key, op, attempts = max_attempts, "Ledger retries exhausted");
        Err(LedgerError::ConcurrencyConflict {
            key,
            attempts: max_attempts,
        })
    }
}

/// Bring a membership in line with the guest acting on it: an ungrouped
/// membership of a grouped guest becomes the group's canonical membership,
/// and every account acting through a group membership is linked.
fn attach_identity(membership: &mut Membership, identity: &GuestIdentity, now: i64) {
    let Some((group_id, email)) = identity.group_scope() else {
        return;
    };

    if membership.group_id.is_none()
        && membership.guest_id == identity.guest_id
        && membership.property_id == identity.property_id
    {
        tracing::info!(
            guest_id = %membership.guest_id,
            property_id = %membership.property_id,
            group_id,
            "Membership adopted into group"
        );
        membership.group_id = Some(group_id.to_string());
        membership.guest_email = Some(email.clone());
    }

    if membership.group_id.as_deref() == Some(group_id) {
        membership.linked_accounts.insert(LinkedAccount {
            property_id: identity.property_id.clone(),
            guest_account_id: identity.guest_id.clone(),
            display_name: identity.display_name.clone(),
            email: Some(email),
            linked_at: now,
        });
    }
}

fn identity_key(identity: &GuestIdentity) -> String {
    match identity.group_scope() {
        Some((group_id, email)) => format!("group:{group_id}:{email}"),
        None => format!("property:{}:{}", identity.guest_id, identity.property_id),
    }
}

fn membership_key(membership: &Membership) -> String {
    match (&membership.group_id, &membership.guest_email) {
        (Some(group_id), Some(email)) => format!("group:{group_id}:{email}"),
        _ => format!("property:{}:{}", membership.guest_id, membership.property_id),
    }
}

fn target_key(target: Target<'_>) -> String {
    match target {
        Target::Identity(identity) => identity_key(identity),
        Target::Id(id) => format!("membership:{id}"),
    }
}

fn receipt(membership: &Membership, tier_upgraded: bool) -> LedgerReceipt {
    LedgerReceipt {
        balance: membership.balance(),
        tier_upgraded,
    }
}

fn log_tier_change(membership: &Membership, outcome: &TierOutcome) {
    if outcome.changed() {
        tracing::info!(
            guest_id = %membership.guest_id,
            property_id = %membership.property_id,
            from = %outcome.previous,
            to = %outcome.current,
            tier_points = membership.tier_points,
            "Tier changed"
        );
    }
}
