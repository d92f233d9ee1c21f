//! HTTP surface driven through the router without a listening socket

mod common;

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use book_lending_server::{api, config::AppConfig, repository::Repository, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{memory_config, DUNE_ISBN};

fn app_with(config: AppConfig) -> Router {
    api::create_router(AppState::new(config, Repository::in_memory()))
}

fn app() -> Router {
    app_with(memory_config())
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": email, "password": "secret123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn create_dune(app: &Router, token: &str, quantity: i32) -> i64 {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/api/v1/books",
            Some(token),
            Some(json!({
                "title": "Dune",
                "author": "Frank Herbert",
                "isbn": DUNE_ISBN,
                "quantity": quantity,
                "category": "Science Fiction"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = app();

    let (status, body) = send(&app, request(Method::GET, "/api/v1/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, request(Method::GET, "/api/v1/ready", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_register_login_and_duplicate_email() {
    let app = app();
    register(&app, "reader@example.com").await;

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "reader@example.com", "password": "secret123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "reader@example.com", "password": "secret123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["email"], "reader@example.com");

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "secret123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_registration_is_bad_request() {
    let app = app();
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 12);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = app();

    let (status, body) = send(
        &app,
        request(Method::POST, "/api/v1/lending/borrow", None, Some(json!({ "book_id": 1 }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/v1/lending/active", Some("garbage"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_borrow_and_return_flow() {
    let app = app();
    let alice = register(&app, "alice@example.com").await;
    let bob = register(&app, "bob@example.com").await;
    let book_id = create_dune(&app, &alice, 1).await;

    let (status, loan) = send(
        &app,
        request(Method::POST, "/api/v1/lending/borrow", Some(&alice), Some(json!({ "book_id": book_id }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["is_active"], true);
    assert_eq!(loan["book"]["isbn"], DUNE_ISBN);
    let loan_id = loan["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        request(Method::POST, "/api/v1/lending/borrow", Some(&bob), Some(json!({ "book_id": book_id }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BookNotAvailable");

    let (_, availability) = send(
        &app,
        request(Method::GET, &format!("/api/v1/books/{}/availability", book_id), None, None),
    )
    .await;
    assert_eq!(availability["available"], 0);
    assert_eq!(availability["quantity"], 1);

    let return_uri = format!("/api/v1/lending/return/{}", loan_id);
    let (status, body) = send(&app, request(Method::PUT, &return_uri, Some(&bob), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NotOwner");

    let (status, body) = send(&app, request(Method::PUT, &return_uri, Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, body) = send(&app, request(Method::PUT, &return_uri, Some(&alice), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyReturned");

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/v1/lending/borrow", Some(&bob), Some(json!({ "book_id": book_id }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, history) = send(
        &app,
        request(Method::GET, "/api/v1/lending/history?page=1&per_page=10", Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["id"], loan_id);

    let (_, active) = send(&app, request(Method::GET, "/api/v1/lending/active", Some(&bob), None)).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_borrow_unknown_book_is_not_found() {
    let app = app();
    let token = register(&app, "reader@example.com").await;

    let (status, body) = send(
        &app,
        request(Method::POST, "/api/v1/lending/borrow", Some(&token), Some(json!({ "book_id": 99 }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchBook");
}

#[tokio::test]
async fn test_history_rejects_zero_page() {
    let app = app();
    let token = register(&app, "reader@example.com").await;

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/v1/lending/history?page=0", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_book_catalog_conflicts() {
    let app = app();
    let token = register(&app, "librarian@example.com").await;
    let book_id = create_dune(&app, &token, 2).await;

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/books",
            Some(&token),
            Some(json!({
                "title": "Dune (reprint)",
                "author": "Frank Herbert",
                "isbn": DUNE_ISBN,
                "quantity": 1,
                "category": "Science Fiction"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/v1/books/{}", book_id),
            Some(&token),
            Some(json!({ "quantity": 4 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 4);
    assert_eq!(body["title"], "Dune");

    send(
        &app,
        request(Method::POST, "/api/v1/lending/borrow", Some(&token), Some(json!({ "book_id": book_id }))),
    )
    .await;
    let (status, _) = send(
        &app,
        request(Method::DELETE, &format!("/api/v1/books/{}", book_id), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, request(Method::GET, "/api/v1/books?per_page=1", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["per_page"], 1);
}

fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let mut config = memory_config();
    config.rate_limit.requests_per_minute = 1;
    config.rate_limit.burst = 2;
    let app = app_with(config);

    for _ in 0..2 {
        let (status, _) = send(
            &app,
            from_peer(request(Method::GET, "/api/v1/health", None, None), "192.0.2.1:4000"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &app,
        from_peer(request(Method::GET, "/api/v1/health", None, None), "192.0.2.1:4001"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "TooManyRequests");

    let (status, _) = send(
        &app,
        from_peer(request(Method::GET, "/api/v1/health", None, None), "192.0.2.2:4000"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_can_be_disabled() {
    let mut config = memory_config();
    config.rate_limit.enabled = false;
    config.rate_limit.burst = 1;
    let app = app_with(config);

    for _ in 0..5 {
        let (status, _) = send(&app, request(Method::GET, "/api/v1/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
