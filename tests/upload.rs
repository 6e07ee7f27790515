mod common;

use common::{create_test_image, spawn_app};
use reqwest::{StatusCode, Url, multipart};
use serde_json::{Value, json};
use sqlx::PgPool;

fn image_form(bytes: Vec<u8>, file_name: &str, mime: &str) -> multipart::Form {
    multipart::Form::new()
        .part(
            "file",
            multipart::Part::bytes(bytes)
                .file_name(file_name.to_string())
                .mime_str(mime)
                .unwrap(),
        )
        .text("category", "equipment")
}

#[sqlx::test]
async fn test_upload_image_is_stored_and_served(pool: PgPool) {
    let app = spawn_app(pool).await;
    let user = app.register("user@example.com", "12 Maple St").await;
    let image = create_test_image();

    let response = app
        .client
        .post(app.url("/upload/image"))
        .bearer_auth(&user.access_token)
        .multipart(image_form(image.clone(), "My Mower.PNG", "image/png"))
        .send()
        .await
        .expect("Failed to upload image");
    assert_eq!(response.status(), StatusCode::CREATED);

    let uploaded: Value = response.json().await.unwrap();
    let key = uploaded["key"].as_str().unwrap();
    assert!(key.starts_with(&format!("uploads/{}/", user.user.id)));
    assert!(key.ends_with("_My_Mower.png"));
    assert_eq!(uploaded["size"], image.len());
    assert_eq!(uploaded["mime_type"], "image/png");
    assert_eq!(uploaded["category"], "equipment");
    assert!(app.upload_dir.join(key).exists());

    let url = uploaded["url"].as_str().unwrap();
    let served = app.client.get(url).send().await.unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.bytes().await.unwrap().to_vec(), image);
}

#[sqlx::test]
async fn test_upload_image_rejects_bad_files(pool: PgPool) {
    let app = spawn_app(pool).await;
    let user = app.register("user@example.com", "12 Maple St").await;

    let cases = [
        (b"plain text".to_vec(), "notes.txt", "text/plain"),
        (b"not really a png".to_vec(), "fake.png", "image/png"),
        (create_test_image(), "photo.exe", "image/png"),
        (Vec::new(), "empty.png", "image/png"),
    ];

    for (bytes, file_name, mime) in cases {
        let response = app
            .client
            .post(app.url("/upload/image"))
            .bearer_auth(&user.access_token)
            .multipart(image_form(bytes, file_name, mime))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "file: {file_name}");
    }

    let response = app
        .client
        .post(app.url("/upload/image"))
        .bearer_auth(&user.access_token)
        .multipart(multipart::Form::new().text("category", "equipment"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "no file provided");
}

#[sqlx::test]
async fn test_presigned_upload_flow(pool: PgPool) {
    let app = spawn_app(pool).await;
    let user = app.register("user@example.com", "12 Maple St").await;

    let response = app
        .post_json(
            &user.access_token,
            "/upload/presigned-url",
            &json!({"file_name": "policy.pdf", "mime_type": "application/pdf"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let presigned: Value = response.json().await.unwrap();
    let upload_url = presigned["upload_url"].as_str().unwrap();
    let key = presigned["key"].as_str().unwrap();
    let document = b"%PDF-1.4\n%test document\n".to_vec();

    // A tampered signature is refused
    let mut tampered = Url::parse(upload_url).unwrap();
    let pairs: Vec<(String, String)> = tampered
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "signature" { "0".repeat(64) } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    tampered.query_pairs_mut().clear().extend_pairs(pairs);
    let response = app
        .client
        .put(tampered)
        .header("Content-Type", "application/pdf")
        .body(document.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!app.upload_dir.join(key).exists());

    let response = app
        .client
        .put(upload_url)
        .header("Content-Type", "application/pdf")
        .body(document.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let stored: Value = response.json().await.unwrap();
    assert_eq!(stored["key"], key);
    assert_eq!(std::fs::read(app.upload_dir.join(key)).unwrap(), document);
}

#[sqlx::test]
async fn test_presigned_url_rejects_unsupported_types(pool: PgPool) {
    let app = spawn_app(pool).await;
    let user = app.register("user@example.com", "12 Maple St").await;

    let response = app
        .post_json(
            &user.access_token,
            "/upload/presigned-url",
            &json!({"file_name": "script.sh", "mime_type": "text/x-shellscript"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn test_users_delete_only_their_own_files(pool: PgPool) {
    let app = spawn_app(pool).await;
    let owner = app.register("owner@example.com", "12 Maple St").await;
    let other = app.register("other@example.com", "14 Maple St").await;

    let uploaded: Value = app
        .client
        .post(app.url("/upload/image"))
        .bearer_auth(&owner.access_token)
        .multipart(image_form(create_test_image(), "lawn.png", "image/png"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let key = uploaded["key"].as_str().unwrap();

    let response = app
        .client
        .delete(app.url("/upload/file"))
        .bearer_auth(&other.access_token)
        .json(&json!({"key": key}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.upload_dir.join(key).exists());

    let response = app
        .client
        .delete(app.url("/upload/file"))
        .bearer_auth(&owner.access_token)
        .json(&json!({"key": key}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!app.upload_dir.join(key).exists());

    let escape = format!("uploads/{}/../{}/x.png", owner.user.id, other.user.id);
    let response = app
        .client
        .delete(app.url("/upload/file"))
        .bearer_auth(&owner.access_token)
        .json(&json!({"key": escape}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
