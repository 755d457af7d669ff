//! Membership Repository
//!
//! The aggregate is stored as a JSON document next to the columns it is
//! looked up by. Every update checks and bumps `version`; a stale writer
//! gets [`RepoError::VersionConflict`].

use super::{RepoError, RepoResult};
use shared::models::Membership;
use sqlx::SqlitePool;

/// A membership together with its row id and the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMembership {
    pub id: i64,
    pub version: i64,
    pub membership: Membership,
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    id: i64,
    version: i64,
    document: String,
}

impl TryFrom<MembershipRow> for StoredMembership {
    type Error = RepoError;

    fn try_from(row: MembershipRow) -> RepoResult<Self> {
        Ok(Self {
            id: row.id,
            version: row.version,
            membership: serde_json::from_str(&row.document)?,
        })
    }
}

const SELECT: &str = "SELECT id, version, document FROM loyalty_membership";

async fn fetch_one_where(
    pool: &SqlitePool,
    clause: &str,
    binds: &[&str],
) -> RepoResult<Option<StoredMembership>> {
    let sql = format!("{SELECT} WHERE {clause}");
    let mut query = sqlx::query_as::<_, MembershipRow>(&sql);
    for value in binds {
        query = query.bind(*value);
    }
    query
        .fetch_optional(pool)
        .await?
        .map(StoredMembership::try_from)
        .transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<StoredMembership>> {
    let sql = format!("{SELECT} WHERE id = ?");
    sqlx::query_as::<_, MembershipRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(StoredMembership::try_from)
        .transpose()
}

pub async fn find_by_guest(
    pool: &SqlitePool,
    guest_id: &str,
    property_id: &str,
) -> RepoResult<Option<StoredMembership>> {
    fetch_one_where(pool, "guest_id = ? AND property_id = ?", &[guest_id, property_id]).await
}

/// Canonical group membership; `email` must already be normalized
pub async fn find_by_group(
    pool: &SqlitePool,
    group_id: &str,
    email: &str,
) -> RepoResult<Option<StoredMembership>> {
    fetch_one_where(pool, "group_id = ? AND guest_email = ?", &[group_id, email]).await
}

/// Membership a `(property, account)` pair was linked into. The earliest
/// link wins if the pair was ever linked twice.
pub async fn find_by_linked_account(
    pool: &SqlitePool,
    property_id: &str,
    guest_account_id: &str,
) -> RepoResult<Option<StoredMembership>> {
    fetch_one_where(
        pool,
        "id = (SELECT membership_id FROM loyalty_linked_account \
         WHERE property_id = ? AND guest_account_id = ? \
         ORDER BY linked_at, membership_id LIMIT 1)",
        &[property_id, guest_account_id],
    )
    .await
}

/// Ids of all active memberships, oldest first
pub async fn list_active_ids(pool: &SqlitePool) -> RepoResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM loyalty_membership WHERE is_active = 1 ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Insert a new membership at version 0; SQLite assigns the row id.
/// A violated guest/property or group/email index comes back as
/// [`RepoError::Duplicate`].
pub async fn insert(pool: &SqlitePool, membership: &Membership) -> RepoResult<StoredMembership> {
    let now = shared::util::now_millis();
    let document = serde_json::to_string(membership)?;

    let mut tx = pool.begin().await?;
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO loyalty_membership (guest_id, property_id, group_id, guest_email, is_active, version, document, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7) RETURNING id",
    )
    .bind(&membership.guest_id)
    .bind(&membership.property_id)
    .bind(&membership.group_id)
    .bind(&membership.guest_email)
    .bind(membership.is_active)
    .bind(&document)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;
    sync_linked_accounts(&mut tx, id, membership).await?;
    tx.commit().await?;

    Ok(StoredMembership {
        id,
        version: 0,
        membership: membership.clone(),
    })
}

/// Overwrite the document if the row is still at `expected_version`.
/// Returns the new version.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    expected_version: i64,
    membership: &Membership,
) -> RepoResult<i64> {
    let now = shared::util::now_millis();
    let document = serde_json::to_string(membership)?;

    let mut tx = pool.begin().await?;
    let rows = sqlx::query(
        "UPDATE loyalty_membership SET group_id = ?1, guest_email = ?2, is_active = ?3, document = ?4, version = version + 1, updated_at = ?5 WHERE id = ?6 AND version = ?7",
    )
    .bind(&membership.group_id)
    .bind(&membership.guest_email)
    .bind(membership.is_active)
    .bind(&document)
    .bind(now)
    .bind(id)
    .bind(expected_version)
    .execute(&mut *tx)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::VersionConflict(format!(
            "Membership {id} is no longer at version {expected_version}"
        )));
    }
    sync_linked_accounts(&mut tx, id, membership).await?;
    tx.commit().await?;

    Ok(expected_version + 1)
}

async fn sync_linked_accounts(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    membership_id: i64,
    membership: &Membership,
) -> RepoResult<()> {
    for account in membership.linked_accounts.iter() {
        sqlx::query(
            "INSERT OR IGNORE INTO loyalty_linked_account (membership_id, property_id, guest_account_id, linked_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(membership_id)
        .bind(&account.property_id)
        .bind(&account.guest_account_id)
        .bind(account.linked_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
