mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use common::{DAY_MS, T0};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use loyalty_server::db::DbService;
use loyalty_server::utils::ManualClock;
use loyalty_server::{Config, ServerState, api};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> (Router, Arc<ManualClock>) {
    let db = DbService::in_memory().await.unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let mut config = Config::with_overrides("/tmp/loyalty-api-test", 0);
    config.tier_thresholds = "0,1000,5000,10000".into();
    config.allow_tier_demotion = false;
    let state = ServerState::new(config, db.pool, clock.clone()).unwrap();
    (api::build_app().with_state(state), clock)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

const ANA: &str = "/api/loyalty/memberships/p-1/ana";

#[tokio::test]
async fn test_health() {
    let (app, _) = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_earn_redeem_expire_flow() {
    let (app, clock) = app().await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("{ANA}/earn"),
        Some(json!({ "points": 100, "description": "Stay", "expiration_months": 12 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"]["available_points"], 100);
    assert_eq!(body["balance"]["tier"], "BRONZE");

    let (status, body) = send(
        &app,
        "POST",
        &format!("{ANA}/redeem"),
        Some(json!({ "points": 40, "value": 4.0, "reward_name": "Free Coffee" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"]["available_points"], 60);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{ANA}/redeem"),
        Some(json!({ "points": 100, "value": 10.0, "reward_name": "Suite" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 4002);
    assert_eq!(body["details"]["available"], 60);

    clock.set(T0 + 400 * DAY_MS);
    let (status, body) = send(&app, "POST", &format!("{ANA}/expire"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expired_points"], 100);

    let (_, body) = send(&app, "GET", &format!("{ANA}/balance"), None).await;
    assert_eq!(body["available_points"], 0);
    assert_eq!(body["tier_points"], 100);
}

#[tokio::test]
async fn test_adjust_scopes() {
    let (app, _) = app().await;
    send(
        &app,
        "POST",
        &format!("{ANA}/earn"),
        Some(json!({ "points": 200, "description": "Stay" })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("{ANA}/adjust"),
        Some(json!({ "delta": 20, "reason": "goodwill credit", "scope": "REDEEMABLE_ONLY" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"]["available_points"], 220);
    assert_eq!(body["balance"]["tier_points"], 200);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{ANA}/adjust"),
        Some(json!({ "delta": 1000, "reason": "status match" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"]["tier_points"], 1200);
    assert_eq!(body["balance"]["tier"], "SILVER");
    assert_eq!(body["tier_upgraded"], true);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{ANA}/adjust"),
        Some(json!({ "delta": 0, "reason": "noop" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_membership_is_not_found() {
    let (app, _) = app().await;
    let (status, body) = send(&app, "GET", "/api/loyalty/memberships/p-1/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4003);
}

#[tokio::test]
async fn test_enroll_and_link_through_group() {
    let (app, _) = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/loyalty/memberships",
        Some(json!({
            "guest_id": "ana",
            "property_id": "p-1",
            "group_id": "grp",
            "email": "ana@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_id"], "grp");

    let (status, _) = send(
        &app,
        "POST",
        "/api/loyalty/memberships",
        Some(json!({ "guest_id": "ana", "property_id": "p-1", "group_id": "grp", "email": "ana@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let group = "?group_id=grp&email=ana@example.com";
    let (status, body) = send(
        &app,
        "POST",
        &format!("{ANA}/links{group}"),
        Some(json!({ "property_id": "p-2", "guest_account_id": "acct-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["linked"], true);

    let (_, body) = send(&app, "GET", &format!("{ANA}/links/p-2/acct-2{group}"), None).await;
    assert_eq!(body["linked"], true);

    let (_, body) = send(&app, "GET", &format!("{ANA}/linked-properties{group}"), None).await;
    assert_eq!(body["property_ids"], json!(["p-1", "p-2"]));
}

#[tokio::test]
async fn test_recompute_with_thresholds_and_validation() {
    let (app, _) = app().await;
    send(
        &app,
        "POST",
        &format!("{ANA}/earn"),
        Some(json!({ "points": 150, "description": "Stay" })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("{ANA}/tier/recompute"),
        Some(json!({ "thresholds": [0, 50, 100, 200] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "GOLD");
    assert_eq!(body["upgraded"], true);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{ANA}/tier/recompute"),
        Some(json!({ "thresholds": [10, 5] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{ANA}/earn"),
        Some(json!({ "points": 10, "description": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sweep_and_deactivate() {
    let (app, clock) = app().await;
    send(
        &app,
        "POST",
        &format!("{ANA}/earn"),
        Some(json!({ "points": 30, "description": "Stay", "expiration_months": 1 })),
    )
    .await;

    clock.advance(60 * DAY_MS);
    let (status, body) = send(&app, "POST", "/api/loyalty/sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points_expired"], 30);
    assert_eq!(body["affected"], 1);

    let (_, body) = send(&app, "POST", &format!("{ANA}/deactivate"), None).await;
    assert_eq!(body["deactivated"], true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{ANA}/earn"),
        Some(json!({ "points": 10, "description": "Stay" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4005);
}
