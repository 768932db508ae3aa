//! End-to-end tests over the HTTP router: checkout produces a signed
//! redirect URL, and the callback endpoint trusts only untampered queries.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use tower::ServiceExt;

use bookshop_payments::config::{AppConfig, VnPayConfig};
use bookshop_payments::services::vnpay::SignedQuery;
use bookshop_payments::{api_v1_routes, handlers, AppState};

const TEST_SECRET: &str = "integration_test_secret";

fn test_state() -> AppState {
    AppState::from_config(AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        environment: "development".into(),
        log_level: "info".into(),
        log_json: false,
        vnpay: VnPayConfig {
            version: "2.1.0".into(),
            command: "pay".into(),
            tmn_code: "BOOKSHOP1".into(),
            currency_code: "VND".into(),
            locale: "vn".into(),
            hash_secret: TEST_SECRET.into(),
            base_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://localhost:8080/api/v1/payments/vnpay/callback".into(),
        },
    })
}

fn test_app() -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes())
        .with_state(test_state())
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Signs `fields` with the test secret and returns the resulting query
/// string, exactly as the gateway would echo it back on the return URL.
fn signed_callback_query(fields: &[(&str, &str)]) -> String {
    let query = SignedQuery::from_fields(fields.iter().copied());
    let url = query.signed_redirect_url("http://ignored.example", TEST_SECRET);
    url.split_once('?').unwrap().1.to_string()
}

#[tokio::test]
async fn checkout_returns_a_signed_redirect_url() {
    let app = test_app();
    let body = serde_json::json!({
        "order_id": 4211,
        "amount": "250000.00",
        "full_name": "Tran Thi B",
        "mobile_number": "0900000000"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/checkout")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.50")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], true);

    let payment_url = json["data"]["payment_url"].as_str().unwrap();
    assert!(payment_url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));

    let parsed = url::Url::parse(payment_url).unwrap();
    let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
    assert_eq!(params["vnp_Amount"], "25000000");
    assert_eq!(params["vnp_IpAddr"], "203.0.113.50");
    assert_eq!(params["vnp_TmnCode"], "BOOKSHOP1");
    assert!(params.contains_key("vnp_SecureHash"));

    // What we hand to the customer must re-validate when it comes back.
    let gateway = test_state().vnpay;
    assert!(gateway.verify_callback(&params).is_ok());
}

#[tokio::test]
async fn checkout_rejects_a_non_positive_amount() {
    let app = test_app();
    let body = serde_json::json!({
        "order_id": 1,
        "amount": "0",
        "full_name": "Tran Thi B"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/checkout")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn valid_callback_reports_the_payment_outcome() {
    let app = test_app();
    let query = signed_callback_query(&[
        ("vnp_TxnRef", "638123456789"),
        ("vnp_TransactionNo", "14226112"),
        ("vnp_OrderInfo", "Payment for order 4211"),
        ("vnp_ResponseCode", "00"),
    ]);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/payments/vnpay/callback?{}", query))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["success"], true);
    assert_eq!(json["data"]["order_id"], "638123456789");
    assert_eq!(json["data"]["transaction_id"], "14226112");
    assert_eq!(json["data"]["order_description"], "Payment for order 4211");
    assert_eq!(json["data"]["payment_method"], "VnPay");
}

#[tokio::test]
async fn declined_payment_is_a_valid_outcome_not_an_error() {
    let app = test_app();
    let query = signed_callback_query(&[
        ("vnp_TxnRef", "638123456789"),
        ("vnp_ResponseCode", "07"),
    ]);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/payments/vnpay/callback?{}", query))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["data"]["success"], false);
    assert_eq!(json["data"]["response_code"], "07");
    assert!(json["message"].as_str().unwrap().contains("fraud"));
}

#[tokio::test]
async fn tampered_callback_is_rejected_with_401() {
    let app = test_app();
    let query = signed_callback_query(&[
        ("vnp_Amount", "10000000"),
        ("vnp_ResponseCode", "00"),
        ("vnp_TxnRef", "638123456789"),
    ]);
    let tampered = query.replace("vnp_Amount=10000000", "vnp_Amount=99999999");
    assert_ne!(query, tampered);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/payments/vnpay/callback?{}", tampered))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = response_json(response).await;
    assert_eq!(json["error"], "Unauthorized");
}

#[tokio::test]
async fn unsigned_callback_is_rejected_with_401() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/payments/vnpay/callback?vnp_ResponseCode=00")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "up");
}
