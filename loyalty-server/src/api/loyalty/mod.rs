//! Loyalty API 模块
//!
//! 会员由路径中的 `(property_id, guest_id)` 标识；集团会员通过查询参数
//! `group_id` + `email` 指定，账本会路由到集团唯一会员。
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/loyalty/memberships | POST | 注册会员 |
//! | /api/loyalty/memberships/{property_id}/{guest_id} | GET | 会员详情 |
//! | .../balance | GET | 积分余额 |
//! | .../earn | POST | 赚取积分 |
//! | .../redeem | POST | 兑换积分 |
//! | .../adjust | POST | 人工调整 (full / redeemable_only) |
//! | .../tier/recompute | POST | 重算等级 |
//! | .../expire | POST | 过期单个会员积分 |
//! | .../links | POST | 关联账户 |
//! | .../links/{linked_property_id}/{account_id} | GET | 是否已关联 |
//! | .../linked-properties | GET | 已关联门店 |
//! | .../deactivate | POST | 停用会员 |
//! | /api/loyalty/sweep | POST | 全量过期扫描 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/loyalty", routes())
}

fn routes() -> Router<ServerState> {
    let member = Router::new()
        .route("/", get(handler::get_membership))
        .route("/balance", get(handler::get_balance))
        .route("/earn", post(handler::earn))
        .route("/redeem", post(handler::redeem))
        .route("/adjust", post(handler::adjust))
        .route("/tier/recompute", post(handler::recompute_tier))
        .route("/expire", post(handler::expire))
        .route("/links", post(handler::link_account))
        .route(
            "/links/{linked_property_id}/{account_id}",
            get(handler::is_linked),
        )
        .route("/linked-properties", get(handler::linked_properties))
        .route("/deactivate", post(handler::deactivate));

    Router::new()
        .route("/memberships", post(handler::enroll))
        .route("/sweep", post(handler::sweep))
        .nest("/memberships/{property_id}/{guest_id}", member)
}
