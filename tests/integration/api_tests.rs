//! HTTP API tests driving the router directly

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use inventory_loans::{api, config::AppConfig, AppState};

use crate::common::{in_days, Harness, SECRET};

fn app(h: &Harness) -> Router {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    api::router(AppState {
        config: Arc::new(config),
        services: Arc::new(h.services.clone()),
    })
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let h = Harness::new();
    let app = app(&h);

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let h = Harness::new();
    let app = app(&h);

    let (status, body) = send(&app, Method::GET, "/api/v1/loans", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);

    let (status, _) = send(&app, Method::GET, "/api/v1/loans", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_loan_lifecycle_over_http() {
    let h = Harness::new();
    let app = app(&h);
    let admin = h.token(&h.admin);
    let requester = h.token(&h.requester);

    let (status, item) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(&admin),
        Some(json!({ "name": "Projector", "location_id": 1, "total_stock": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["available"], 10);
    assert_eq!(item["status"], "available");
    let item_id = item["id"].as_i64().unwrap();

    let (status, loan) = send(
        &app,
        Method::POST,
        "/api/v1/loans",
        Some(&requester),
        Some(json!({ "item_id": item_id, "location_id": 3, "requested_quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["state"], "pending");
    let loan_id = loan["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/loans/{}/approve", loan_id),
        Some(&requester),
        Some(json!({ "due_at": in_days(7).to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, loan) = send(
        &app,
        Method::POST,
        &format!("/api/v1/loans/{}/approve", loan_id),
        Some(&admin),
        Some(json!({ "due_at": in_days(7).to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loan["state"], "approved");

    let (_, item) = send(&app, Method::GET, &format!("/api/v1/items/{}", item_id), Some(&requester), None).await;
    assert_eq!(item["available"], 6);

    let (status, loan) = send(
        &app,
        Method::POST,
        &format!("/api/v1/loans/{}/delay", loan_id),
        Some(&admin),
        Some(json!({ "new_due_at": in_days(14).to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loan["state"], "postponed");

    let (status, loan) = send(
        &app,
        Method::POST,
        &format!("/api/v1/loans/{}/return", loan_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loan["state"], "returned");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/loans/{}/return", loan_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "IllegalTransition");

    let (_, item) = send(&app, Method::GET, &format!("/api/v1/items/{}", item_id), Some(&admin), None).await;
    assert_eq!(item["available"], 10);
}

#[tokio::test]
async fn test_insufficient_stock_over_http() {
    let h = Harness::new();
    let app = app(&h);
    let admin = h.token(&h.admin);

    let item = h.item("Tablet", 5).await;
    let first = h.request(&item, 4).await;
    let second = h.request(&item, 3).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/loans/{}/approve", first.id),
        Some(&admin),
        Some(json!({ "due_at": in_days(1).to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/loans/{}/approve", second.id),
        Some(&admin),
        Some(json!({ "due_at": in_days(1).to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 8);
}

#[tokio::test]
async fn test_list_and_delete_over_http() {
    let h = Harness::new();
    let app = app(&h);
    let admin = h.token(&h.admin);
    let other = h.token(&h.other);

    let item = h.item("Globe", 5).await;
    let loan = h.request(&item, 1).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/loans?state=pending", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, Method::GET, "/api/v1/loans", Some(&other), None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::GET, &format!("/api/v1/loans/{}", loan.id), Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::DELETE, &format!("/api/v1/loans/{}", loan.id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/loans/{}", loan.id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5);
}

#[tokio::test]
async fn test_resize_below_loaned_units_over_http() {
    let h = Harness::new();
    let app = app(&h);
    let admin = h.token(&h.admin);

    let item = h.item("Chair", 10).await;
    let loan = h.request(&item, 6).await;
    h.services
        .loans
        .approve_loan(&h.admin, loan.id, Some(in_days(1)))
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/items/{}/stock", item.id),
        Some(&admin),
        Some(json!({ "total_stock": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 7);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/items/{}/stock", item.id),
        Some(&admin),
        Some(json!({ "total_stock": 8 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], 2);
}
