//! Integration tests for cart-to-order checkout: tax composition, snapshot
//! freezing, atomic cart clearing, and the checkout validation errors.

mod common;

use axum::http::{Method, StatusCode};
use common::{as_decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

fn checkout_payload(region: &str) -> serde_json::Value {
    json!({
        "shipping_name": "Ada Lovelace",
        "line1": "1 Main St",
        "city": "Toronto",
        "postal_code": "M5V 1A1",
        "region": region
    })
}

#[tokio::test]
async fn checkout_freezes_ontario_hst_totals() {
    let app = TestApp::new().await;
    app.seed_ontario().await;
    let mug = app.seed_product("Maple Mug", dec!(7.50)).await;
    let toque = app.seed_product("Toque", dec!(5.00)).await;

    let carts = &app.state.services.carts;
    carts.add_item(app.user_id, mug.id, 2).await.unwrap();
    carts.add_item(app.user_id, toque.id, 1).await.unwrap();

    let response = app
        .request_as_user(Method::POST, "/api/v1/checkout", Some(checkout_payload("Ontario")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let order = &body["data"]["order"];
    assert_eq!(as_decimal(&order["subtotal"]), dec!(20.00));
    assert_eq!(as_decimal(&order["tax"]), dec!(2.60));
    assert_eq!(as_decimal(&order["total"]), dec!(22.60));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["region"], "Ontario");
    // No gateway configured in tests, so checkout reports no redirect.
    assert!(body["data"]["payment_url"].is_null());

    // Cart was cleared in the same transaction.
    let lines = carts.lines(app.user_id).await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn order_items_snapshot_name_and_price() {
    let app = TestApp::new().await;
    app.seed_ontario().await;
    let mug = app.seed_product("Maple Mug", dec!(10.00)).await;

    let carts = &app.state.services.carts;
    carts.add_item(app.user_id, mug.id, 2).await.unwrap();

    let order = app
        .state
        .services
        .orders
        .create_from_cart(&app.user(), serde_json::from_value(checkout_payload("Ontario")).unwrap())
        .await
        .unwrap();

    // A later price change must not reach the frozen snapshot.
    let admin_response = app
        .request_as_admin(
            Method::PUT,
            &format!("/api/v1/admin/products/{}", mug.id),
            Some(json!({ "name": "Maple Mug Deluxe", "price": "99.00", "active": true })),
        )
        .await;
    assert_eq!(admin_response.status(), StatusCode::OK);

    let (order, items) = app
        .state
        .services
        .orders
        .get_order_with_items(order.id)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_name, "Maple Mug");
    assert_eq!(items[0].unit_price, dec!(10.00));
    assert_eq!(items[0].quantity, 2);
    assert_eq!(order.subtotal, dec!(20.00));
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;
    app.seed_ontario().await;

    let response = app
        .request_as_user(Method::POST, "/api/v1/checkout", Some(checkout_payload("Ontario")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("empty"));
}

#[tokio::test]
async fn empty_cart_is_reported_before_a_bad_region() {
    let app = TestApp::new().await;

    // No regions seeded and no cart lines: the cart complaint comes first.
    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_payload("Atlantis")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("empty"));
}

#[tokio::test]
async fn unknown_region_rejects_checkout_but_quotes_zero() {
    let app = TestApp::new().await;
    app.seed_ontario().await;
    let mug = app.seed_product("Maple Mug", dec!(10.00)).await;
    app.state
        .services
        .carts
        .add_item(app.user_id, mug.id, 1)
        .await
        .unwrap();

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_payload("Atlantis")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The cart survives the failed checkout.
    let lines = app.state.services.carts.lines(app.user_id).await.unwrap();
    assert_eq!(lines.len(), 1);

    // The preview path fails open: unknown region, rate 0.
    let quote = app
        .request_as_user(Method::GET, "/api/v1/checkout/quote?region=Atlantis", None)
        .await;
    assert_eq!(quote.status(), StatusCode::OK);
    let body = response_json(quote).await;
    assert_eq!(as_decimal(&body["data"]["tax"]), dec!(0));
    assert_eq!(as_decimal(&body["data"]["subtotal"]), dec!(10.00));
}

#[tokio::test]
async fn blank_region_is_rejected() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Maple Mug", dec!(10.00)).await;
    app.state
        .services
        .carts
        .add_item(app.user_id, mug.id, 1)
        .await
        .unwrap();

    let response = app
        .request_as_user(Method::POST, "/api/v1/checkout", Some(checkout_payload("")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delisted_product_blocks_checkout() {
    let app = TestApp::new().await;
    app.seed_ontario().await;
    let mug = app.seed_product("Maple Mug", dec!(10.00)).await;
    app.state
        .services
        .carts
        .add_item(app.user_id, mug.id, 1)
        .await
        .unwrap();

    let response = app
        .request_as_admin(Method::DELETE, &format!("/api/v1/admin/products/{}", mug.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_as_user(Method::POST, "/api/v1/checkout", Some(checkout_payload("Ontario")))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn tax_components_sum_across_gst_and_pst() {
    let app = TestApp::new().await;
    app.seed_region("British Columbia", Some(dec!(0.05)), Some(dec!(0.07)), None)
        .await;
    let board = app.seed_product("Cedar Board", dec!(100.00)).await;
    app.state
        .services
        .carts
        .add_item(app.user_id, board.id, 1)
        .await
        .unwrap();

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_payload("British Columbia")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(as_decimal(&body["data"]["order"]["tax"]), dec!(12.00));
    assert_eq!(as_decimal(&body["data"]["order"]["total"]), dec!(112.00));
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    app.seed_ontario().await;
    let mug = app.seed_product("Maple Mug", dec!(10.00)).await;
    app.state
        .services
        .carts
        .add_item(app.user_id, mug.id, 1)
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .create_from_cart(&app.user(), serde_json::from_value(checkout_payload("Ontario")).unwrap())
        .await
        .unwrap();

    let mine = app
        .request_as_user(Method::GET, &format!("/api/v1/orders/{}", order.id), None)
        .await;
    assert_eq!(mine.status(), StatusCode::OK);

    let stranger = maplecart_api::auth::issue_token(
        common::JWT_SECRET,
        uuid::Uuid::new_v4(),
        "other@example.com",
        false,
        3600,
    )
    .unwrap();
    let not_mine = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order.id),
            None,
            Some(&stranger),
        )
        .await;
    assert_eq!(not_mine.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn receipt_downloads_for_the_owner() {
    let app = TestApp::new().await;
    app.seed_ontario().await;
    let mug = app.seed_product("Maple Mug", dec!(10.00)).await;
    app.state
        .services
        .carts
        .add_item(app.user_id, mug.id, 2)
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .create_from_cart(&app.user(), serde_json::from_value(checkout_payload("Ontario")).unwrap())
        .await
        .unwrap();

    // While the order is still pending, the receipt is only a pro forma.
    let pending = app
        .request_as_user(
            Method::GET,
            &format!("/api/v1/orders/{}/receipt", order.id),
            None,
        )
        .await;
    assert_eq!(pending.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(pending.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().starts_with("PRO FORMA"));

    app.state
        .services
        .order_status
        .mark_paid(order.id, "pi_receipt")
        .await
        .unwrap();

    let response = app
        .request_as_user(
            Method::GET,
            &format!("/api/v1/orders/{}/receipt", order.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .contains("receipt-"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("RECEIPT"));
    assert!(text.contains("Maple Mug"));
}
