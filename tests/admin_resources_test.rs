//! Integration tests for admin CRUD: region uniqueness and coupon
//! validation.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn region_names_are_unique_ignoring_case() {
    let app = TestApp::new().await;

    let response = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/regions",
            Some(json!({ "name": "Ontario", "hst": "0.13" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let duplicate = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/regions",
            Some(json!({ "name": "ontario", "hst": "0.13" })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn region_update_rejects_a_taken_name_but_keeps_its_own() {
    let app = TestApp::new().await;
    app.seed_region("Ontario", None, None, Some(rust_decimal_macros::dec!(0.13)))
        .await;
    let quebec = app
        .seed_region(
            "Quebec",
            Some(rust_decimal_macros::dec!(0.05)),
            Some(rust_decimal_macros::dec!(0.09975)),
            None,
        )
        .await;

    let stolen = app
        .request_as_admin(
            Method::PUT,
            &format!("/api/v1/admin/regions/{}", quebec.id),
            Some(json!({ "name": "ONTARIO" })),
        )
        .await;
    assert_eq!(stolen.status(), StatusCode::CONFLICT);

    // Renaming to itself (case change only) is allowed.
    let own = app
        .request_as_admin(
            Method::PUT,
            &format!("/api/v1/admin/regions/{}", quebec.id),
            Some(json!({ "name": "quebec", "gst": "0.05", "pst": "0.09975" })),
        )
        .await;
    assert_eq!(own.status(), StatusCode::OK);
}

#[tokio::test]
async fn percent_coupons_must_stay_between_1_and_100() {
    let app = TestApp::new().await;

    let ok = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({ "code": "SAVE10", "kind": "percent", "value": "10" })),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let too_big = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({ "code": "SAVE200", "kind": "percent", "value": "200" })),
        )
        .await;
    assert_eq!(too_big.status(), StatusCode::BAD_REQUEST);

    let too_small = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({ "code": "TINY", "kind": "amount", "value": "0.001" })),
        )
        .await;
    assert_eq!(too_small.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn coupon_windows_must_be_ordered() {
    let app = TestApp::new().await;

    let response = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({
                "code": "BACKWARDS",
                "kind": "amount",
                "value": "5.00",
                "starts_at": "2026-09-01T00:00:00Z",
                "ends_at": "2026-08-01T00:00:00Z"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn coupon_lifecycle_create_update_delete() {
    let app = TestApp::new().await;

    let created = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({ "code": "WELCOME", "kind": "amount", "value": "5.00" })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::OK);
    let body = response_json(created).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let updated = app
        .request_as_admin(
            Method::PUT,
            &format!("/api/v1/admin/coupons/{}", id),
            Some(json!({ "code": "WELCOME", "kind": "percent", "value": "15", "active": false })),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let body = response_json(updated).await;
    assert_eq!(body["data"]["kind"], "percent");
    assert_eq!(body["data"]["active"], false);

    let deleted = app
        .request_as_admin(Method::DELETE, &format!("/api/v1/admin/coupons/{}", id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = app
        .request_as_admin(Method::DELETE, &format!("/api/v1/admin/coupons/{}", id), None)
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}
