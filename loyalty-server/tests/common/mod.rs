#![allow(dead_code)]

use std::sync::Arc;

use loyalty_server::db::DbService;
use loyalty_server::loyalty::TierPolicy;
use loyalty_server::services::{LedgerSettings, LedgerStore};
use loyalty_server::utils::ManualClock;
use shared::models::GuestIdentity;

/// 2025-01-01T00:00:00Z
pub const T0: i64 = 1_735_689_600_000;
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct Harness {
    pub store: Arc<LedgerStore>,
    pub clock: Arc<ManualClock>,
}

pub async fn harness() -> Harness {
    harness_with(TierPolicy::default(), LedgerSettings::default()).await
}

pub async fn harness_with(policy: TierPolicy, settings: LedgerSettings) -> Harness {
    let db = DbService::in_memory().await.expect("in-memory database");
    let clock = Arc::new(ManualClock::new(T0));
    let store = LedgerStore::new(db.pool, clock.clone(), policy, settings);
    Harness {
        store: Arc::new(store),
        clock,
    }
}

pub fn guest(id: &str, property: &str) -> GuestIdentity {
    GuestIdentity::new(id, property)
}
