//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use heartplan::{
    ServerConfig,
    auth::IdentitySource,
    create_app,
    db::{Database, Gender, NewIdentity, RelationshipStatus},
    jwt::{Clock, FixedClock, SystemClock, TokenCodec, TokenIssuer},
    password::hash_password,
};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";
pub const ACCESS_TTL: u64 = 900;
pub const REFRESH_TTL: u64 = 3600;

pub struct TestApp {
    pub app: Router,
    pub db: Database,
}

pub async fn test_app(identity_source: IdentitySource) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        access_token_ttl: ACCESS_TTL,
        refresh_token_ttl: REFRESH_TTL,
        identity_source,
    };
    TestApp {
        app: create_app(&config),
        db,
    }
}

/// Create an enabled user directly in the database. Returns the user ID.
pub async fn create_user(db: &Database, email: &str, username: &str, password: &str) -> i64 {
    db.users()
        .create(&NewIdentity {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hash_password(password).unwrap(),
            age: 26,
            gender: Gender::Female,
            relationship_status: RelationshipStatus::Single,
            avatar_url: Some("https://cdn.example.com/a.png".to_string()),
            location: Some("Berlin".to_string()),
        })
        .await
        .unwrap()
}

pub fn now() -> u64 {
    SystemClock.now()
}

/// Issuer sharing the app's signing key, stamped at a chosen time.
pub fn issuer_at(now: u64) -> TokenIssuer {
    let codec = TokenCodec::with_clock(TEST_SECRET, Arc::new(FixedClock(now)));
    TokenIssuer::new(Arc::new(codec), ACCESS_TTL, REFRESH_TTL)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn put_json(
    app: &Router,
    uri: &str,
    bearer: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

/// GET with a raw `Authorization` header value.
pub async fn get_with_authorization(app: &Router, uri: &str, value: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, value)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Log in through the API and return the response body.
pub async fn login(app: &Router, email: &str, password: &str) -> Value {
    let (status, body) = post_json(
        app,
        "/api/auth/login",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

/// Decode a token payload without verifying it.
pub fn payload(token: &str) -> Value {
    use base64::Engine;
    let segment = token.split('.').nth(1).expect("token has no payload");
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .expect("payload is not base64url");
    serde_json::from_slice(&bytes).expect("payload is not JSON")
}

/// Flip one character of the payload segment, keeping the signature.
pub fn tamper(token: &str) -> String {
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let payload = &mut parts[1];
    let idx = payload.len() / 2;
    let replacement = if payload.as_bytes()[idx] == b'A' { "B" } else { "A" };
    payload.replace_range(idx..idx + 1, replacement);
    parts.join(".")
}
