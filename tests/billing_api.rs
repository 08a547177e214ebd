//! Router-level tests for the endpoints that do not need a database.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tower::ServiceExt;

use rentbill_api::config::AppConfig;
use rentbill_api::{app, AppState};

fn test_app() -> axum::Router {
    let config = AppConfig {
        cache_warmer_enabled: false,
        ..AppConfig::default()
    };
    let db = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://localhost:1/rentbill_test")
        .expect("lazy pool");
    app(AppState::new(db, config))
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = test_app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_preview_without_pdc() {
    let (status, body) = send(post_json(
        "/api/billing/preview",
        json!({
            "bill": {
                "base_rent": "10,000",
                "advance_payment_amount": 2000,
                "advance_payment_months": "2"
            },
            "additional_charges": [{"type": "Water", "amount": 500}],
            "discounts": [{"type": "Promo", "amount": "300"}]
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currency"], "PHP");
    assert_eq!(body["pdc"], Value::Null);
    assert_eq!(body["breakdown"]["advance_deduction"], "1000");
    assert_eq!(body["breakdown"]["subtotal"], "9500");
    assert_eq!(body["breakdown"]["total"], "9200");
    assert_eq!(body["breakdown"]["rent_included"], true);
}

#[tokio::test]
async fn test_preview_cleared_pdc_allows_negative_total() {
    let (status, body) = send(post_json(
        "/api/billing/preview",
        json!({
            "bill": {
                "base_rent": 10000,
                "advance_payment_amount": 2000,
                "advance_payment_months": 2
            },
            "additional_charges": [{"type": "Water", "amount": 500}],
            "discounts": [{"type": "Promo", "amount": 300}],
            "pdcs": [
                {"status": "bounced", "amount": 10000, "check_number": "1"},
                {"status": "cleared", "amount": 10000, "check_number": "2"}
            ]
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pdc"]["status"], "cleared");
    assert_eq!(body["breakdown"]["pdc_deduction"], "10000");
    assert_eq!(body["breakdown"]["total"], "-800");
}

#[tokio::test]
async fn test_preview_pending_pdc_keeps_rent() {
    let (status, body) = send(post_json(
        "/api/billing/preview",
        json!({
            "bill": {"base_rent": 8000},
            "pdcs": [
                {"status": "cleared", "amount": 8000},
                {"status": "pending", "amount": 8000}
            ]
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pdc"]["status"], "pending");
    assert_eq!(body["breakdown"]["pdc_deduction"], "0");
    assert_eq!(body["breakdown"]["total"], "8000");
}

#[tokio::test]
async fn test_preview_garbage_amounts_are_zero() {
    let (status, body) = send(post_json(
        "/api/billing/preview",
        json!({
            "bill": {"base_rent": null, "advance_payment_months": "n/a"},
            "additional_charges": [{"type": "Water", "amount": "abc"}]
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["breakdown"]["total"], "0");
}

#[tokio::test]
async fn test_preview_huge_amounts_do_not_crash() {
    let max = "79228162514264337593543950335";
    let (status, body) = send(post_json(
        "/api/billing/preview",
        json!({
            "bill": {"base_rent": max},
            "additional_charges": [{"type": "Water", "amount": max}]
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["breakdown"]["subtotal"], max);
    assert_eq!(body["breakdown"]["total"], max);
}

#[tokio::test]
async fn test_invalid_unit_id_is_rejected() {
    let request = Request::builder()
        .uri("/api/billing/units/not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("UUID"));
}

#[tokio::test]
async fn test_save_invalid_unit_id_is_json_error() {
    let (status, body) = send(post_json(
        "/api/billing/units/not-a-uuid/save",
        json!({"additional_charges": []}),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_preview_without_bill_is_json_error() {
    let (status, body) = send(post_json(
        "/api/billing/preview",
        json!({"additional_charges": []}),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("bill"));
}

#[tokio::test]
async fn test_malformed_json_is_json_error() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/billing/preview")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
}

#[tokio::test]
async fn test_list_bad_limit_is_json_error() {
    let request = Request::builder()
        .uri("/api/billing/bills?limit=lots")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
}

#[tokio::test]
async fn test_save_blank_charge_type_is_rejected() {
    let uri = format!("/api/billing/units/{}/save", uuid::Uuid::new_v4());
    let (status, body) = send(post_json(
        &uri,
        json!({
            "additional_charges": [{"type": "Water", "amount": 500}],
            "discounts": [{"type": "  ", "amount": 100}]
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert_eq!(body["message"], "Please enter a type for every discount line");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let request = Request::builder()
        .uri("/api/billing/nowhere")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["db"], false);
    assert_eq!(body["cache"]["reviews_size"], 0);
}
