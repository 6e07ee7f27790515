#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use mowsy::{
    config::{AppConfig, Environment, StorageConfig},
    handlers::AuthResponse,
    models::Services,
    services::{
        geocoding::{GeocodeError, GeocodeResult, Geocoder},
        payment::LogPaymentProcessor,
        storage::LocalStorage,
    },
};
use reqwest::StatusCode;
use secrecy::{SecretSlice, SecretString};
use serde_json::{Value, json};
use sqlx::PgPool;
use std::net::SocketAddr;
use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::net::TcpListener;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const PASSWORD: &str = "password123";

pub fn init_tracing_once() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("mowsy=debug")
            .with_test_writer()
            .init();
    });
}

/// A geocoder with a fixed address book.
///
/// - `... Maple St ...` resolves to zip 62701 in "Springfield District 186"
/// - `... Birch Ave ...` resolves to zip 62704 in "Springfield District 186"
/// - `... Lake Rd ...` resolves to zip 60601 in "Chicago Public Schools"
///
/// Anything else has no match. Every lookup is recorded.
#[derive(Debug, Default)]
pub struct MockGeocoder {
    lookups: Mutex<Vec<String>>,
}

impl MockGeocoder {
    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        self.lookups.lock().unwrap().push(address.to_string());

        let (zip, district, code) = if address.contains("Maple St") {
            ("62701", "Springfield District 186", "1736840")
        } else if address.contains("Birch Ave") {
            ("62704", "Springfield District 186", "1736840")
        } else if address.contains("Lake Rd") {
            ("60601", "Chicago Public Schools", "1709930")
        } else {
            return Err(GeocodeError::NoResults);
        };

        Ok(GeocodeResult {
            latitude: 39.78,
            longitude: -89.65,
            zip_code: Some(zip.to_string()),
            district_name: Some(district.to_string()),
            district_code: Some(code.to_string()),
        })
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub payments: Arc<LogPaymentProcessor>,
    pub geocoder: Arc<MockGeocoder>,
    pub upload_dir: PathBuf,
}

/// Spawns the application on a random port with mock collaborators.
///
/// Returned address format: `http://127.0.0.1:8492`
pub async fn spawn_app(test_db_pool: PgPool) -> TestApp {
    init_tracing_once();

    // Randomly choose an available port
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port at localhost");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{port}");

    let upload_dir = std::env::temp_dir().join(format!("mowsy-test-{}", uuid::Uuid::new_v4()));
    let signing_secret = b"test-storage-secret".to_vec();

    let config = AppConfig {
        environment: Environment::Development,
        bind_address: format!("127.0.0.1:{port}"),
        jwt_secret: SecretSlice::from(b"test-jwt-secret-for-integration-tests".to_vec()),
        admin_api_key: Some(SecretString::from(ADMIN_KEY.to_string())),
        stripe: None,
        geocodio: None,
        storage: StorageConfig {
            upload_dir: upload_dir.clone(),
            public_base_url: address.clone(),
            signing_secret: SecretSlice::from(signing_secret.clone()),
        },
        rate_limit_per_minute: 10_000,
    };

    let payments = Arc::new(LogPaymentProcessor::new());
    let geocoder = Arc::new(MockGeocoder::default());
    let services = Services {
        payment_processor: payments.clone(),
        geocoder: geocoder.clone(),
        storage: Arc::new(LocalStorage::new(
            upload_dir.clone(),
            address.clone(),
            SecretSlice::from(signing_secret),
        )),
    };

    let app = mowsy::app_with_services(test_db_pool, &config, services);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    // Wait for server to be ready
    let client = reqwest::Client::new();
    for _ in 0..10 {
        if client
            .get(format!("{address}/api/v1/health-check"))
            .send()
            .await
            .is_ok()
        {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    TestApp {
        address,
        client,
        payments,
        geocoder,
        upload_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.address)
    }

    /// Registers a user living at `address` and returns the sign-in response.
    pub async fn register(&self, email: &str, address: &str) -> AuthResponse {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "email": email,
                "password": PASSWORD,
                "first_name": "Test",
                "last_name": "User",
                "phone": "217-555-0100",
                "address": address,
                "city": "Springfield",
                "state": "IL",
            }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Failed to parse auth response")
    }

    /// Uploads an insurance document for the user and verifies it as admin.
    pub async fn insure(&self, auth: &AuthResponse) {
        let response = self
            .client
            .post(self.url("/users/me/insurance"))
            .bearer_auth(&auth.access_token)
            .json(&json!({"document_url": format!("{}/uploads/{}/policy.pdf", self.address, auth.user.id)}))
            .send()
            .await
            .expect("Failed to upload insurance");
        assert_eq!(response.status(), StatusCode::OK);

        let response = self
            .client
            .put(self.url(&format!("/admin/users/{}/verify-insurance", auth.user.id)))
            .header("X-Admin-Key", ADMIN_KEY)
            .send()
            .await
            .expect("Failed to verify insurance");
        assert_eq!(response.status(), StatusCode::OK);
    }

    pub async fn post_json(&self, token: &str, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put_json(&self, token: &str, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_as(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates a job owned by `token`'s user and returns its JSON.
    pub async fn create_job(&self, token: &str, body: &Value) -> Value {
        let response = self.post_json(token, "/jobs", body).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Failed to parse job")
    }

    /// Creates a listing and returns its JSON.
    pub async fn create_equipment(&self, token: &str, body: &Value) -> Value {
        let response = self.post_json(token, "/equipment", body).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Failed to parse equipment")
    }

    /// Drives a job from open to in progress with `worker` accepted.
    pub async fn start_job(&self, owner: &AuthResponse, worker: &AuthResponse) -> String {
        let job = self.create_job(&owner.access_token, &job_payload()).await;
        let job_id = job["id"].as_str().unwrap().to_string();

        let response = self
            .post_json(
                &worker.access_token,
                &format!("/jobs/{job_id}/apply"),
                &json!({"message": "I can do it this weekend"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let application: Value = response.json().await.unwrap();

        let response = self
            .put_json(
                &owner.access_token,
                &format!("/jobs/{job_id}/applications/{}", application["id"].as_str().unwrap()),
                &json!({"status": "accepted"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        job_id
    }
}

pub fn job_payload() -> Value {
    json!({
        "title": "Mow front and back lawn",
        "description": "Quarter acre, push mower provided",
        "category": "mowing",
        "fixed_price": 45.0,
        "estimated_hours": 2.0,
        "visibility": "zip_code",
    })
}

pub fn equipment_payload(daily_rental_price: f64) -> Value {
    json!({
        "name": "Push mower",
        "make": "Honda",
        "model": "HRN216",
        "category": "mower",
        "fuel_type": "gas",
        "power_type": "gas",
        "daily_rental_price": daily_rental_price,
        "description": "Self-propelled, recently serviced",
        "visibility": "zip_code",
    })
}

/// RFC 3339 timestamp `days` from now.
pub fn days_from_now(days: i64) -> String {
    (OffsetDateTime::now_utc() + Duration::days(days))
        .format(&Rfc3339)
        .unwrap()
}

/// Creates a simple 1x1 PNG image and returns its byte representation.
pub fn create_test_image() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, // IHDR chunk length
        0x49, 0x48, 0x44, 0x52, // IHDR
        0x00, 0x00, 0x00, 0x01, // Width: 1
        0x00, 0x00, 0x00, 0x01, // Height: 1
        0x08, 0x02, 0x00, 0x00, 0x00, // Bit depth 8, RGB
        0x90, 0x77, 0x53, 0xDE, // CRC
        0x00, 0x00, 0x00, 0x0C, // IDAT chunk length
        0x49, 0x44, 0x41, 0x54, // IDAT
        0x08, 0x99, 0x01, 0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, // Image data
        0x02, 0x00, 0x01, 0xE5, // CRC
        0x00, 0x00, 0x00, 0x00, // IEND chunk length
        0x49, 0x45, 0x4E, 0x44, // IEND
        0xAE, 0x42, 0x60, 0x82, // CRC
    ]
}
