mod common;

use common::{PASSWORD, spawn_app};
use mowsy::handlers::AuthResponse;
use reqwest::StatusCode;
use serde_json::{Value, json};
use sqlx::PgPool;

fn registration(email: &str, password: &str) -> Value {
    json!({
        "email": email,
        "password": password,
        "first_name": "Jordan",
        "last_name": "Reyes",
        "address": "12 Maple St",
        "city": "Springfield",
        "state": "IL",
    })
}

#[sqlx::test]
async fn test_register_returns_tokens_and_geocoded_user(pool: PgPool) {
    let app = spawn_app(pool).await;

    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&registration("Jordan@Example.com", "longenough"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let auth: AuthResponse = response.json().await.unwrap();
    assert_eq!(auth.token_type, "Bearer");
    assert!(!auth.access_token.is_empty());
    assert!(!auth.refresh_token.is_empty());
    assert_eq!(auth.user.email, "jordan@example.com");
    assert_eq!(auth.user.zip_code, "62701");
    assert_eq!(
        auth.user.elementary_school_district_name,
        "Springfield District 186"
    );
    assert!(!auth.user.insurance_verified);
}

#[sqlx::test]
async fn test_register_password_length_boundary(pool: PgPool) {
    let app = spawn_app(pool).await;

    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&registration("short@example.com", "1234567"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&registration("exact@example.com", "12345678"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[sqlx::test]
async fn test_register_rejects_bad_email_and_duplicates(pool: PgPool) {
    let app = spawn_app(pool).await;

    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&registration("not-an-email", PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.register("dup@example.com", "12 Maple St").await;
    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&registration("DUP@example.com", PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "user with this email already exists");
}

#[sqlx::test]
async fn test_register_succeeds_when_geocoding_fails(pool: PgPool) {
    let app = spawn_app(pool).await;

    let auth = app.register("nowhere@example.com", "1 Unknown Way").await;

    assert_eq!(app.geocoder.lookup_count(), 1);
    assert!(auth.user.latitude.is_none());
    assert!(auth.user.elementary_school_district_name.is_empty());
}

#[sqlx::test]
async fn test_login_with_valid_and_invalid_credentials(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.register("login@example.com", "12 Maple St").await;

    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({"email": "login@example.com", "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let auth: AuthResponse = response.json().await.unwrap();
    assert_eq!(auth.user.email, "login@example.com");

    for (email, password) in [
        ("login@example.com", "wrong-password"),
        ("nobody@example.com", PASSWORD),
    ] {
        let response = app
            .client
            .post(app.url("/auth/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "invalid credentials");
    }
}

#[sqlx::test]
async fn test_refresh_rotates_tokens(pool: PgPool) {
    let app = spawn_app(pool).await;
    let auth = app.register("refresh@example.com", "12 Maple St").await;

    let response = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({"refresh_token": auth.refresh_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated: AuthResponse = response.json().await.unwrap();
    assert_ne!(rotated.refresh_token, auth.refresh_token);

    // The presented token was consumed
    let response = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({"refresh_token": auth.refresh_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({"refresh_token": rotated.refresh_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test]
async fn test_logout_revokes_refresh_token(pool: PgPool) {
    let app = spawn_app(pool).await;
    let auth = app.register("logout@example.com", "12 Maple St").await;

    let response = app
        .client
        .post(app.url("/auth/logout"))
        .json(&json!({"refresh_token": auth.refresh_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({"refresh_token": auth.refresh_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
async fn test_protected_routes_require_bearer_token(pool: PgPool) {
    let app = spawn_app(pool).await;

    let response = app.client.get(app.url("/users/me")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get_as("garbage.token.value", "/users/me").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let auth = app.register("me@example.com", "12 Maple St").await;
    let response = app.get_as(&auth.access_token, "/users/me").await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["id"], auth.user.id.to_string());
    assert!(me.get("password_hash").is_none());
}
