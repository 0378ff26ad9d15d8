//! Integration tests for the cart API: additive upserts, quantity rules, and
//! the sign-in merge.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn adding_the_same_product_twice_sums_quantities() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Maple Mug", dec!(7.50)).await;

    for _ in 0..2 {
        let response = app
            .request_as_user(
                Method::POST,
                "/api/v1/cart/items",
                Some(json!({ "product_id": mug.id, "quantity": 2 })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.request_as_user(Method::GET, "/api/v1/cart", None).await;
    let body = response_json(response).await;
    let lines = body["data"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["item"]["quantity"], 4);
}

#[tokio::test]
async fn zero_quantity_removes_the_line() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Maple Mug", dec!(7.50)).await;
    app.state
        .services
        .carts
        .add_item(app.user_id, mug.id, 3)
        .await
        .unwrap();

    let response = app
        .request_as_user(
            Method::PUT,
            &format!("/api/v1/cart/items/{}", mug.id),
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let lines = app.state.services.carts.lines(app.user_id).await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn unknown_or_delisted_products_cannot_be_added() {
    let app = TestApp::new().await;

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": Uuid::new_v4(), "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let mug = app.seed_product("Maple Mug", dec!(7.50)).await;
    app.request_as_admin(
        Method::DELETE,
        &format!("/api/v1/admin/products/{}", mug.id),
        None,
    )
    .await;

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": mug.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn merge_is_additive_and_skips_bad_lines() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Maple Mug", dec!(7.50)).await;
    let toque = app.seed_product("Toque", dec!(5.00)).await;
    app.state
        .services
        .carts
        .add_item(app.user_id, mug.id, 1)
        .await
        .unwrap();

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/cart/merge",
            Some(json!({
                "lines": [
                    { "product_id": mug.id, "quantity": 2 },
                    { "product_id": toque.id, "quantity": 1 },
                    { "product_id": Uuid::new_v4(), "quantity": 5 },
                    { "product_id": toque.id, "quantity": 0 }
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["merged_lines"], 2);

    let lines = app.state.services.carts.lines(app.user_id).await.unwrap();
    assert_eq!(lines.len(), 2);
    let mug_line = lines
        .iter()
        .find(|l| l.item.product_id == mug.id)
        .unwrap();
    assert_eq!(mug_line.item.quantity, 3);
}

#[tokio::test]
async fn cart_requires_authentication() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn storefront_product_list_hides_delisted_items() {
    let app = TestApp::new().await;
    app.seed_product("Maple Mug", dec!(7.50)).await;
    let hidden = app.seed_product("Old Stock", dec!(1.00)).await;
    app.request_as_admin(
        Method::DELETE,
        &format!("/api/v1/admin/products/{}", hidden.id),
        None,
    )
    .await;

    let response = app.request(Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Maple Mug");

    // The admin list still sees everything.
    let response = app
        .request_as_admin(Method::GET, "/api/v1/admin/products", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
}
