//! Loyalty API Handlers

use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::models::{AdjustmentScope, GuestIdentity, Membership, PointsBalance, Tier};

use crate::core::ServerState;
use crate::loyalty::{AdjustPoints, EarnPoints, LinkRequest, RedeemPoints, TierTable};
use crate::services::{LedgerReceipt, SweepReport};
use crate::utils::validation::{
    MAX_ID_LEN, MAX_NAME_LEN, MAX_NOTE_LEN, MAX_REF_LEN, validate_expiration_months,
    validate_optional_email, validate_optional_text, validate_required_text,
};
use crate::utils::{AppError, AppResult};

/// `{property_id}/{guest_id}` path segment
#[derive(Debug, Deserialize)]
pub struct MemberPath {
    pub property_id: String,
    pub guest_id: String,
}

/// Group scope of the acting guest
#[derive(Debug, Default, Deserialize)]
pub struct GroupQuery {
    pub group_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Enrollment payload
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub guest_id: String,
    pub property_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
    pub reason: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default = "default_scope")]
    pub scope: AdjustmentScope,
}

fn default_scope() -> AdjustmentScope {
    AdjustmentScope::Full
}

/// Optional custom thresholds (Bronze first) for a recompute
#[derive(Debug, Default, Deserialize)]
pub struct RecomputeRequest {
    #[serde(default)]
    pub thresholds: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub struct TierResponse {
    pub previous: Tier,
    pub tier: Tier,
    pub upgraded: bool,
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    pub expired_points: i64,
}

#[derive(Debug, Deserialize)]
pub struct LinkPath {
    pub property_id: String,
    pub guest_id: String,
    pub linked_property_id: String,
    pub account_id: String,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub linked: bool,
}

#[derive(Debug, Serialize)]
pub struct LinkedPropertiesResponse {
    pub property_ids: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub deactivated: bool,
}

fn identity(
    property_id: String,
    guest_id: String,
    group: GroupQuery,
) -> AppResult<GuestIdentity> {
    validate_required_text(&property_id, "property_id", MAX_ID_LEN)?;
    validate_required_text(&guest_id, "guest_id", MAX_ID_LEN)?;
    validate_optional_text(&group.group_id, "group_id", MAX_ID_LEN)?;
    validate_optional_email(&group.email, "email")?;
    validate_optional_text(&group.display_name, "display_name", MAX_NAME_LEN)?;

    Ok(GuestIdentity {
        guest_id,
        property_id,
        group_id: group.group_id,
        email: group.email,
        display_name: group.display_name,
    })
}

fn member_identity(path: MemberPath, group: GroupQuery) -> AppResult<GuestIdentity> {
    identity(path.property_id, path.guest_id, group)
}

/// POST /api/loyalty/memberships - 注册会员
pub async fn enroll(
    State(state): State<ServerState>,
    Json(payload): Json<EnrollRequest>,
) -> AppResult<Json<Membership>> {
    let identity = identity(
        payload.property_id,
        payload.guest_id,
        GroupQuery {
            group_id: payload.group_id,
            email: payload.email,
            display_name: payload.display_name,
        },
    )?;
    let membership = state.ledger.enroll(&identity).await?;
    Ok(Json(membership))
}

/// GET /api/loyalty/memberships/:property_id/:guest_id - 会员详情
pub async fn get_membership(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
) -> AppResult<Json<Membership>> {
    let identity = member_identity(path, group)?;
    Ok(Json(state.ledger.find(&identity).await?))
}

/// GET /api/loyalty/memberships/:property_id/:guest_id/balance - 积分余额
pub async fn get_balance(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
) -> AppResult<Json<PointsBalance>> {
    let identity = member_identity(path, group)?;
    Ok(Json(state.ledger.balance(&identity).await?))
}

/// POST /api/loyalty/memberships/:property_id/:guest_id/earn - 赚取积分
pub async fn earn(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
    Json(payload): Json<EarnPoints>,
) -> AppResult<Json<LedgerReceipt>> {
    let identity = member_identity(path, group)?;
    validate_required_text(&payload.description, "description", MAX_NOTE_LEN)?;
    validate_optional_text(&payload.source_ref, "source_ref", MAX_REF_LEN)?;
    validate_optional_text(&payload.earned_at_property_id, "earned_at_property_id", MAX_ID_LEN)?;
    validate_expiration_months(payload.expiration_months)?;
    if payload.spending.is_some_and(|s| !s.is_finite() || s < 0.0) {
        return Err(AppError::validation("spending must be a non-negative amount"));
    }
    if payload.nights.is_some_and(|n| n < 0) {
        return Err(AppError::validation("nights must not be negative"));
    }

    let receipt = state.ledger.earn(&identity, &payload).await?;
    Ok(Json(receipt))
}

/// POST /api/loyalty/memberships/:property_id/:guest_id/redeem - 兑换积分
pub async fn redeem(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
    Json(payload): Json<RedeemPoints>,
) -> AppResult<Json<LedgerReceipt>> {
    let identity = member_identity(path, group)?;
    validate_required_text(&payload.reward_name, "reward_name", MAX_NAME_LEN)?;
    validate_optional_text(&payload.reward_ref, "reward_ref", MAX_REF_LEN)?;
    validate_optional_text(&payload.source_ref, "source_ref", MAX_REF_LEN)?;
    if !payload.value.is_finite() || payload.value < 0.0 {
        return Err(AppError::validation("value must be a non-negative amount"));
    }

    let receipt = state.ledger.redeem(&identity, &payload).await?;
    Ok(Json(receipt))
}

/// POST /api/loyalty/memberships/:property_id/:guest_id/adjust - 人工调整积分
pub async fn adjust(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
    Json(payload): Json<AdjustRequest>,
) -> AppResult<Json<LedgerReceipt>> {
    let identity = member_identity(path, group)?;
    validate_required_text(&payload.reason, "reason", MAX_NOTE_LEN)?;
    validate_optional_text(&payload.note, "note", MAX_NOTE_LEN)?;

    let request = AdjustPoints {
        delta: payload.delta,
        reason: payload.reason,
        note: payload.note,
    };
    let receipt = match payload.scope {
        AdjustmentScope::Full => state.ledger.adjust_full(&identity, &request).await?,
        AdjustmentScope::RedeemableOnly => {
            state
                .ledger
                .adjust_redeemable_only(&identity, &request)
                .await?
        }
    };
    Ok(Json(receipt))
}

/// POST /api/loyalty/memberships/:property_id/:guest_id/tier/recompute - 重算等级
pub async fn recompute_tier(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
    payload: Option<Json<RecomputeRequest>>,
) -> AppResult<Json<TierResponse>> {
    let identity = member_identity(path, group)?;
    let table = match payload.and_then(|Json(p)| p.thresholds) {
        Some(minimums) => Some(TierTable::from_minimums(&minimums)?),
        None => None,
    };

    let outcome = state.ledger.recompute_tier(&identity, table.as_ref()).await?;
    Ok(Json(TierResponse {
        previous: outcome.previous,
        tier: outcome.current,
        upgraded: outcome.upgraded(),
    }))
}

/// POST /api/loyalty/memberships/:property_id/:guest_id/expire - 过期积分
pub async fn expire(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
) -> AppResult<Json<ExpireResponse>> {
    let identity = member_identity(path, group)?;
    let expired_points = state.ledger.expire(&identity).await?;
    Ok(Json(ExpireResponse { expired_points }))
}

/// POST /api/loyalty/sweep - 全量过期扫描
pub async fn sweep(State(state): State<ServerState>) -> AppResult<Json<SweepReport>> {
    Ok(Json(state.ledger.expire_all().await?))
}

/// POST /api/loyalty/memberships/:property_id/:guest_id/links - 关联账户
pub async fn link_account(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
    Json(payload): Json<LinkRequest>,
) -> AppResult<Json<LinkResponse>> {
    let identity = member_identity(path, group)?;
    validate_required_text(&payload.property_id, "property_id", MAX_ID_LEN)?;
    validate_required_text(&payload.guest_account_id, "guest_account_id", MAX_ID_LEN)?;
    validate_optional_text(&payload.display_name, "display_name", MAX_NAME_LEN)?;
    validate_optional_email(&payload.email, "email")?;

    let linked = state.ledger.link_account(&identity, &payload).await?;
    Ok(Json(LinkResponse { linked }))
}

/// GET /api/loyalty/memberships/:property_id/:guest_id/links/:linked_property_id/:account_id
pub async fn is_linked(
    State(state): State<ServerState>,
    Path(path): Path<LinkPath>,
    Query(group): Query<GroupQuery>,
) -> AppResult<Json<LinkResponse>> {
    let identity = identity(path.property_id, path.guest_id, group)?;
    let linked = state
        .ledger
        .is_linked(&identity, &path.linked_property_id, &path.account_id)
        .await?;
    Ok(Json(LinkResponse { linked }))
}

/// GET /api/loyalty/memberships/:property_id/:guest_id/linked-properties
pub async fn linked_properties(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
) -> AppResult<Json<LinkedPropertiesResponse>> {
    let identity = member_identity(path, group)?;
    let property_ids = state.ledger.linked_properties(&identity).await?;
    Ok(Json(LinkedPropertiesResponse { property_ids }))
}

/// POST /api/loyalty/memberships/:property_id/:guest_id/deactivate - 停用会员
pub async fn deactivate(
    State(state): State<ServerState>,
    Path(path): Path<MemberPath>,
    Query(group): Query<GroupQuery>,
) -> AppResult<Json<DeactivateResponse>> {
    let identity = member_identity(path, group)?;
    let deactivated = state.ledger.deactivate(&identity).await?;
    Ok(Json(DeactivateResponse { deactivated }))
}
