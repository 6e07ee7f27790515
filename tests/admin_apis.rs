mod common;

use common::{ADMIN_KEY, PASSWORD, days_from_now, equipment_payload, job_payload, spawn_app};
use mowsy::services::admin::AdminStats;
use reqwest::StatusCode;
use serde_json::{Value, json};
use sqlx::PgPool;

#[sqlx::test]
async fn test_admin_key_is_required(pool: PgPool) {
    let app = spawn_app(pool).await;

    let response = app
        .client
        .get(app.url("/admin/stats"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/admin/stats"))
        .header("X-Admin-Key", "not-the-key")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/admin/stats"))
        .header("X-Admin-Key", ADMIN_KEY.to_uppercase())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test]
async fn test_stats_count_platform_activity(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let renter = app.register("renter@example.com", "14 Maple St").await;
    app.create_job(&owner.access_token, &job_payload()).await;
    let item = app
        .create_equipment(&owner.access_token, &equipment_payload(30.0))
        .await;
    let response = app
        .post_json(
            &renter.access_token,
            &format!("/equipment/{}/rent", item["id"].as_str().unwrap()),
            &json!({"start_date": days_from_now(1), "end_date": days_from_now(2)}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    app.insure(&owner).await;

    let stats: AdminStats = app
        .client
        .get(app.url("/admin/stats"))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.active_users, 2);
    assert_eq!(stats.verified_insurance_users, 1);
    assert_eq!(stats.total_jobs, 1);
    assert_eq!(stats.open_jobs, 1);
    assert_eq!(stats.completed_jobs, 0);
    assert_eq!(stats.total_equipment, 1);
    assert_eq!(stats.available_equipment, 1);
    assert_eq!(stats.total_rentals, 1);
    assert_eq!(stats.active_rentals, 0);
    assert_eq!(stats.total_payments, 0);
}

#[sqlx::test]
async fn test_list_users_with_filters(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.register("a@example.com", "12 Maple St").await;
    app.register("b@example.com", "3 Birch Ave").await;
    let insured = app.register("c@example.com", "9 Lake Rd").await;
    app.insure(&insured).await;

    let page: Value = app
        .client
        .get(app.url("/admin/users?limit=2"))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["total_pages"], 2);

    let page: Value = app
        .client
        .get(app.url("/admin/users?school_district=Springfield%20District%20186"))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["pagination"]["total"], 2);

    let page: Value = app
        .client
        .get(app.url("/admin/users?insurance_verified=true"))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["email"], "c@example.com");
}

#[sqlx::test]
async fn test_deactivated_user_cannot_sign_in(pool: PgPool) {
    let app = spawn_app(pool).await;
    let user = app.register("user@example.com", "12 Maple St").await;

    let response = app
        .client
        .put(app.url(&format!("/admin/users/{}/deactivate", user.user.id)))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({"email": "user@example.com", "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({"refresh_token": user.refresh_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .put(app.url(&format!("/admin/users/{}/activate", user.user.id)))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({"email": "user@example.com", "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .put(app.url(&format!("/admin/users/{}/activate", uuid::Uuid::new_v4())))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn test_verify_insurance_requires_document(pool: PgPool) {
    let app = spawn_app(pool).await;
    let user = app.register("user@example.com", "12 Maple St").await;

    let response = app
        .client
        .put(app.url(&format!("/admin/users/{}/verify-insurance", user.user.id)))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "user has not uploaded insurance document");

    app.insure(&user).await;

    let me: Value = app
        .get_as(&user.access_token, "/users/me")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(me["insurance_verified"], true);
    assert!(me["insurance_verified_at"].is_string());

    // A new document revokes the verification
    let response = app
        .post_json(
            &user.access_token,
            "/users/me/insurance",
            &json!({"document_url": "http://127.0.0.1/uploads/new-policy.pdf"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["insurance_verified"], false);
}

#[sqlx::test]
async fn test_remove_listings(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let renter = app.register("renter@example.com", "14 Maple St").await;
    let worker = app.register("worker@example.com", "16 Maple St").await;

    // Admins may remove jobs in any status
    let job_id = app.start_job(&owner, &worker).await;
    let response = app
        .client
        .delete(app.url(&format!("/admin/jobs/{job_id}")))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .client
        .get(app.url(&format!("/jobs/{job_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let item = app
        .create_equipment(&owner.access_token, &equipment_payload(30.0))
        .await;
    let equipment_id = item["id"].as_str().unwrap();
    let rental: Value = app
        .post_json(
            &renter.access_token,
            &format!("/equipment/{equipment_id}/rent"),
            &json!({"start_date": days_from_now(1), "end_date": days_from_now(2)}),
        )
        .await
        .json()
        .await
        .unwrap();
    let response = app
        .put_json(
            &owner.access_token,
            &format!("/equipment/{equipment_id}/rentals/{}", rental["id"].as_str().unwrap()),
            &json!({"status": "approved"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .delete(app.url(&format!("/admin/equipment/{equipment_id}")))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .delete(app.url(&format!("/admin/equipment/{}", uuid::Uuid::new_v4())))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
