mod common;

use common::{job_payload, spawn_app};
use reqwest::StatusCode;
use serde_json::{Value, json};
use sqlx::PgPool;

#[sqlx::test]
async fn test_create_job_inherits_owner_location(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;

    let job = app.create_job(&owner.access_token, &job_payload()).await;

    assert_eq!(job["status"], "open");
    assert_eq!(job["zip_code"], "62701");
    assert_eq!(job["elementary_school_district_name"], "Springfield District 186");
    assert_eq!(job["user"]["id"], owner.user.id.to_string());

    let response = app
        .client
        .get(app.url(&format!("/jobs/{}", job["id"].as_str().unwrap())))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["title"], "Mow front and back lawn");
}

#[sqlx::test]
async fn test_job_address_that_fails_to_geocode_keeps_owner_location(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let neighbour = app.register("neighbour@example.com", "14 Maple St").await;

    let mut payload = job_payload();
    payload["address"] = json!("999 Unknown Blvd");
    let job = app.create_job(&owner.access_token, &payload).await;

    assert_eq!(job["address"], "999 Unknown Blvd");
    assert_eq!(job["zip_code"], "62701");
    assert_eq!(job["elementary_school_district_name"], "Springfield District 186");

    let jobs: Vec<Value> = app
        .get_as(&neighbour.access_token, "/jobs?filter=true")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], job["id"]);
}

#[sqlx::test]
async fn test_job_address_is_geocoded(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;

    let mut payload = job_payload();
    payload["address"] = json!("3 Birch Ave");
    let job = app.create_job(&owner.access_token, &payload).await;

    assert_eq!(job["zip_code"], "62704");
    assert_eq!(job["elementary_school_district_name"], "Springfield District 186");
}

#[sqlx::test]
async fn test_create_job_rejects_non_positive_price(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;

    let mut payload = job_payload();
    payload["fixed_price"] = json!(0.0);
    let response = app.post_json(&owner.access_token, "/jobs", &payload).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "fixed price must be greater than 0");
}

#[sqlx::test]
async fn test_apply_rules(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let worker = app.register("worker@example.com", "14 Maple St").await;
    let job = app.create_job(&owner.access_token, &job_payload()).await;
    let apply_path = format!("/jobs/{}/apply", job["id"].as_str().unwrap());

    let response = app
        .post_json(&owner.access_token, &apply_path, &json!({"message": "me"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(&worker.access_token, &apply_path, &json!({"message": "hi"}))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let application: Value = response.json().await.unwrap();
    assert_eq!(application["status"], "pending");

    let response = app
        .post_json(&worker.access_token, &apply_path, &json!({"message": "again"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "you have already applied for this job");

    // Only the owner sees applications
    let applications_path = format!("/jobs/{}/applications", job["id"].as_str().unwrap());
    let response = app.get_as(&worker.access_token, &applications_path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.get_as(&owner.access_token, &applications_path).await;
    assert_eq!(response.status(), StatusCode::OK);
    let applications: Vec<Value> = response.json().await.unwrap();
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0]["applicant"]["id"], worker.user.id.to_string());

    // Cancelled jobs stop taking applications
    let late = app.register("late@example.com", "16 Maple St").await;
    let response = app
        .post_json(
            &owner.access_token,
            &format!("/jobs/{}/cancel", job["id"].as_str().unwrap()),
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .post_json(&late.access_token, &apply_path, &json!({"message": "hello"}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "job not found or not accepting applications");
}

#[sqlx::test]
async fn test_accepting_applications_moves_job_to_in_progress(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let first = app.register("first@example.com", "14 Maple St").await;
    let second = app.register("second@example.com", "16 Maple St").await;
    let job = app.create_job(&owner.access_token, &job_payload()).await;
    let job_id = job["id"].as_str().unwrap();

    let mut application_ids = Vec::new();
    for worker in [&first, &second] {
        let response = app
            .post_json(
                &worker.access_token,
                &format!("/jobs/{job_id}/apply"),
                &json!({}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let application: Value = response.json().await.unwrap();
        application_ids.push(application["id"].as_str().unwrap().to_string());
    }

    let response = app
        .put_json(
            &owner.access_token,
            &format!("/jobs/{job_id}/applications/{}", application_ids[0]),
            &json!({"status": "accepted"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let job: Value = app
        .get_as(&owner.access_token, &format!("/jobs/{job_id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(job["status"], "in_progress");

    // A second acceptance succeeds and leaves the job where it is
    let response = app
        .put_json(
            &owner.access_token,
            &format!("/jobs/{job_id}/applications/{}", application_ids[1]),
            &json!({"status": "accepted"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let decided: Value = response.json().await.unwrap();
    assert_eq!(decided["status"], "accepted");

    let job: Value = app
        .get_as(&owner.access_token, &format!("/jobs/{job_id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(job["status"], "in_progress");

    // Decisions are final
    let response = app
        .put_json(
            &owner.access_token,
            &format!("/jobs/{job_id}/applications/{}", application_ids[0]),
            &json!({"status": "rejected"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // In-progress jobs take no applications and can no longer be edited or deleted
    let late = app.register("late@example.com", "18 Maple St").await;
    let response = app
        .post_json(&late.access_token, &format!("/jobs/{job_id}/apply"), &json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .put_json(
            &owner.access_token,
            &format!("/jobs/{job_id}"),
            &json!({"title": "New title"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .delete(app.url(&format!("/jobs/{job_id}")))
        .bearer_auth(&owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "cannot delete job that is not open");
}

#[sqlx::test]
async fn test_completion_requires_verified_insurance(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let worker = app.register("worker@example.com", "14 Maple St").await;
    let job_id = app.start_job(&owner, &worker).await;
    let complete_path = format!("/jobs/{job_id}/complete");
    let photos = json!({"completion_image_urls": ["http://127.0.0.1/uploads/after.jpg"]});

    let response = app
        .post_json(&owner.access_token, &complete_path, &photos)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Insurance verification required for this action"
    );

    app.insure(&owner).await;

    let response = app
        .post_json(&owner.access_token, &complete_path, &photos)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let job: Value = response.json().await.unwrap();
    assert_eq!(job["status"], "completed");
    assert_eq!(
        job["completion_image_urls"],
        json!(["http://127.0.0.1/uploads/after.jpg"])
    );

    // Completed jobs cannot be completed or cancelled again
    let response = app
        .post_json(&owner.access_token, &complete_path, &photos)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = app
        .post_json(&owner.access_token, &format!("/jobs/{job_id}/cancel"), &json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn test_open_job_update_cancel_and_delete(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let stranger = app.register("stranger@example.com", "14 Maple St").await;
    let job = app.create_job(&owner.access_token, &job_payload()).await;
    let job_id = job["id"].as_str().unwrap();

    let response = app
        .put_json(
            &stranger.access_token,
            &format!("/jobs/{job_id}"),
            &json!({"title": "Mine now"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .put_json(
            &owner.access_token,
            &format!("/jobs/{job_id}"),
            &json!({"title": "Edge the driveway", "fixed_price": 30.0}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["title"], "Edge the driveway");
    assert_eq!(updated["fixed_price"], 30.0);
    assert_eq!(updated["description"], job["description"]);

    let response = app
        .post_json(&owner.access_token, &format!("/jobs/{job_id}/cancel"), &json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled: Value = response.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");

    let second = app.create_job(&owner.access_token, &job_payload()).await;
    let response = app
        .client
        .delete(app.url(&format!("/jobs/{}", second["id"].as_str().unwrap())))
        .bearer_auth(&owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mine: Vec<Value> = app
        .get_as(&owner.access_token, "/jobs/my")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["status"], "cancelled");

    let open: Vec<Value> = app
        .client
        .get(app.url("/jobs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(open.is_empty());

    let cancelled: Vec<Value> = app
        .client
        .get(app.url("/jobs?status=cancelled"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
}

#[sqlx::test]
async fn test_visibility_filter_matches_zip_or_district(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let neighbour = app.register("neighbour@example.com", "14 Maple St").await;
    let same_district = app.register("district@example.com", "3 Birch Ave").await;
    let far_away = app.register("far@example.com", "9 Lake Rd").await;

    let zip_job = app.create_job(&owner.access_token, &job_payload()).await;
    let mut district_payload = job_payload();
    district_payload["visibility"] = json!("school_district");
    let district_job = app.create_job(&owner.access_token, &district_payload).await;

    let visible_ids = |jobs: Vec<Value>| -> Vec<String> {
        let mut ids: Vec<String> = jobs
            .iter()
            .map(|job| job["id"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        ids
    };
    let mut both = vec![
        zip_job["id"].as_str().unwrap().to_string(),
        district_job["id"].as_str().unwrap().to_string(),
    ];
    both.sort();

    let jobs = app.get_as(&neighbour.access_token, "/jobs?filter=true").await;
    assert_eq!(visible_ids(jobs.json().await.unwrap()), both);

    let jobs = app.get_as(&same_district.access_token, "/jobs?filter=true").await;
    assert_eq!(
        visible_ids(jobs.json().await.unwrap()),
        vec![district_job["id"].as_str().unwrap().to_string()]
    );

    let jobs = app.get_as(&far_away.access_token, "/jobs?filter=true").await;
    assert!(visible_ids(jobs.json().await.unwrap()).is_empty());

    // Owners never see their own listings while filtering
    let jobs = app.get_as(&owner.access_token, "/jobs?filter=true").await;
    assert!(visible_ids(jobs.json().await.unwrap()).is_empty());

    // Without the flag everything open is listed
    let jobs = app.get_as(&far_away.access_token, "/jobs").await;
    assert_eq!(visible_ids(jobs.json().await.unwrap()), both);
}

#[sqlx::test]
async fn test_visibility_filter_surfaces_database_errors(pool: PgPool) {
    let app = spawn_app(pool.clone()).await;
    let viewer = app.register("viewer@example.com", "14 Maple St").await;

    // Loading the viewer's row now fails while listings still load
    sqlx::query("ALTER TABLE users RENAME COLUMN phone TO phone_number")
        .execute(&pool)
        .await
        .unwrap();

    let response = app.get_as(&viewer.access_token, "/jobs").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get_as(&viewer.access_token, "/jobs?filter=true").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
