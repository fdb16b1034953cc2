//! Integration tests for the Friendsgiving backend.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinSet;

use crate::blob::testing::RecordingBlobs;
use crate::config::{Config, StorageBackend};
use crate::db::{init_database, SqliteStore};
use crate::images::testing::RecordingImages;
use crate::images::ImageService;
use crate::{create_router, AppState};

const ADMIN_KEY: &str = "test-admin-key";
const MAX_UPLOAD_BYTES: usize = 1024;

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    images: Arc<RecordingImages>,
    blobs: Arc<RecordingBlobs>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some(ADMIN_KEY.to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let store = Arc::new(SqliteStore::new(pool));

        let images = Arc::new(RecordingImages::default());
        let blobs = Arc::new(RecordingBlobs::default());

        let config = Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_json: false,
            storage: StorageBackend::Sqlite,
            db_path,
            admin_psk: psk,
            image_api_key: None,
            image_timeout: Duration::from_secs(5),
            blob_token: None,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        };

        let state = AppState::new(
            store,
            ImageService::new(images.clone(), config.image_timeout),
            blobs.clone(),
            config,
        );
        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            images,
            blobs,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_dish(&self, name: &str, tags: &[&str]) -> Value {
        let resp = self
            .client
            .post(self.url("/api/admin/dishes"))
            .header("x-api-key", ADMIN_KEY)
            .json(&json!({ "dishName": name, "dietaryTags": tags }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    async fn claim(&self, id: &str, person: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/dishes/{}/claim", id)))
            .json(&json!({ "personName": person }))
            .send()
            .await
            .unwrap()
    }

    async fn react(&self, id: &str, emoji: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/dishes/{}/react", id)))
            .json(&json!({ "emoji": emoji }))
            .send()
            .await
            .unwrap()
    }

    async fn upload(&self, person: &str, bytes: Vec<u8>, mime: &str) -> reqwest::Response {
        let file = Part::bytes(bytes)
            .file_name("family.jpg")
            .mime_str(mime)
            .unwrap();
        let form = Form::new().text("personName", person.to_string()).part("file", file);
        self.client
            .post(self.url("/api/gallery/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_admin_requires_key() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/dishes"))
        .json(&json!({ "dishName": "Stuffing", "dietaryTags": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/dishes"))
        .header("x-api-key", "wrong-key")
        .json(&json!({ "dishName": "Stuffing", "dietaryTags": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Bearer token is accepted as well
    let resp = fixture
        .client
        .post(fixture.url("/api/admin/dishes"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "dishName": "Stuffing", "dietaryTags": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    assert_eq!(fixture.images.generated(), 1);
}

#[tokio::test]
async fn test_admin_open_without_psk() {
    let fixture = TestFixture::with_psk(None).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/dishes"))
        .json(&json!({ "dishName": "Stuffing", "dietaryTags": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn test_public_routes_need_no_key() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/dishes"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_create_list_and_get_dish() {
    let fixture = TestFixture::new().await;

    let dish = fixture
        .create_dish("Sweet Potato Casserole", &["vegetarian", "gluten-free"])
        .await;
    assert_eq!(dish["dishName"], "Sweet Potato Casserole");
    assert_eq!(dish["dietaryTags"], json!(["vegetarian", "gluten-free"]));
    assert!(dish["claimedBy"].is_null());
    assert!(dish["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://images.test/generated/"));
    assert!(dish["createdAt"].is_i64());

    let later = fixture.create_dish("Pumpkin Pie", &[]).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/dishes"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&dish["id"].as_str().unwrap()));
    assert!(ids.contains(&later["id"].as_str().unwrap()));

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/dishes/{}", dish["id"].as_str().unwrap())))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], dish);
}

#[tokio::test]
async fn test_create_validation_skips_image_generation() {
    let fixture = TestFixture::new().await;

    for payload in [
        json!({ "dishName": "   ", "dietaryTags": [] }),
        json!({ "dishName": "Salad" }),
        json!({ "dietaryTags": ["vegan"] }),
        json!({ "dishName": "Salad", "dietaryTags": ["carnivore"] }),
    ] {
        let resp = fixture
            .client
            .post(fixture.url("/api/admin/dishes"))
            .header("x-api-key", ADMIN_KEY)
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    assert_eq!(fixture.images.generated(), 0);
}

#[tokio::test]
async fn test_get_missing_dish() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/dishes/dish_missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_claim_once() {
    let fixture = TestFixture::new().await;
    let dish = fixture.create_dish("Green Bean Casserole", &[]).await;
    let id = dish["id"].as_str().unwrap();

    let resp = fixture.claim(id, "Alice").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["claimedBy"], "Alice");

    let resp = fixture.claim(id, "Bob").await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "ALREADY_CLAIMED");
    assert_eq!(body["error"]["details"]["claimedBy"], "Alice");

    let resp = fixture.claim(id, "  ").await;
    assert_eq!(resp.status(), 400);

    let resp = fixture.claim("dish_missing", "Bob").await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_concurrent_claims_single_winner() {
    let fixture = TestFixture::new().await;
    let dish = fixture.create_dish("Turkey", &[]).await;
    let url = fixture.url(&format!("/api/dishes/{}/claim", dish["id"].as_str().unwrap()));

    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let client = fixture.client.clone();
        let url = url.clone();
        tasks.spawn(async move {
            client
                .post(url)
                .json(&json!({ "personName": format!("Guest {}", i) }))
                .send()
                .await
                .unwrap()
                .status()
        });
    }

    let mut won = 0;
    let mut lost = 0;
    while let Some(status) = tasks.join_next().await {
        match status.unwrap().as_u16() {
            200 => won += 1,
            409 => lost += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(lost, 9);
}

#[tokio::test]
async fn test_reactions_accumulate() {
    let fixture = TestFixture::new().await;
    let dish = fixture.create_dish("Cornbread", &[]).await;
    let id = dish["id"].as_str().unwrap();

    for _ in 0..3 {
        assert_eq!(fixture.react(id, "🔥").await.status(), 200);
    }
    let resp = fixture.react(id, "😋").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["reactions"], json!({ "🔥": 3, "😋": 1 }));

    assert_eq!(fixture.react(id, "").await.status(), 400);
    assert_eq!(fixture.react("dish_missing", "🔥").await.status(), 404);
}

#[tokio::test]
async fn test_badges_follow_current_state() {
    let fixture = TestFixture::new().await;
    let turkey = fixture.create_dish("Roast Turkey", &[]).await;
    // Keep creation timestamps distinct
    tokio::time::sleep(Duration::from_millis(5)).await;
    let pie = fixture.create_dish("Pumpkin Pie", &[]).await;
    let turkey_id = turkey["id"].as_str().unwrap();
    let pie_id = pie["id"].as_str().unwrap();

    let badges = |id: String| {
        let client = fixture.client.clone();
        let url = fixture.url(&format!("/api/dishes/{}/badges", id));
        async move {
            let body: Value = client.get(url).send().await.unwrap().json().await.unwrap();
            body["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|b| b["label"].as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        }
    };

    // Unclaimed dishes earn nothing
    assert!(badges(turkey_id.to_string()).await.is_empty());

    fixture.claim(turkey_id, "Alice").await;
    fixture.claim(pie_id, "Alice").await;
    for _ in 0..3 {
        fixture.react(pie_id, "🥧").await;
    }

    assert_eq!(
        badges(turkey_id.to_string()).await,
        vec!["First!", "Double Threat", "Main Event"]
    );
    assert_eq!(
        badges(pie_id.to_string()).await,
        vec!["Double Threat", "Sweet Tooth", "MVP"]
    );

    let resp = fixture
        .client
        .get(fixture.url("/api/dishes/dish_missing/badges"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_update_renames_and_regenerates_image() {
    let fixture = TestFixture::new().await;
    let dish = fixture.create_dish("Rolls", &[]).await;
    let id = dish["id"].as_str().unwrap();

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/admin/dishes/{}", id)))
        .header("x-api-key", ADMIN_KEY)
        .json(&json!({ "dishName": "Garlic Knots", "dietaryTags": ["vegetarian"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["dishName"], "Garlic Knots");
    assert_eq!(body["data"]["dietaryTags"], json!(["vegetarian"]));
    assert_ne!(body["data"]["imageUrl"], dish["imageUrl"]);
    assert_eq!(fixture.images.generated(), 2);

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/admin/dishes/{}", id)))
        .header("x-api-key", ADMIN_KEY)
        .json(&json!({ "dishName": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .client
        .put(fixture.url("/api/admin/dishes/dish_missing"))
        .header("x-api-key", ADMIN_KEY)
        .json(&json!({ "dishName": "Pie" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_update_rejects_oversized_reaction_counts() {
    let fixture = TestFixture::new().await;
    let dish = fixture.create_dish("Cornbread", &[]).await;
    let id = dish["id"].as_str().unwrap();
    let path = format!("/api/admin/dishes/{}", id);

    let resp = fixture
        .client
        .put(fixture.url(&path))
        .header("x-api-key", ADMIN_KEY)
        .json(&json!({ "reactions": { "🔥": u64::MAX } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let resp = fixture
        .client
        .put(fixture.url(&path))
        .header("x-api-key", ADMIN_KEY)
        .json(&json!({ "reactions": { "🔥": i64::MAX } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture.react(id, "🔥").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["reactions"]["🔥"], i64::MAX);

    fixture.react(id, "😋").await;
    fixture.claim(id, "Alice").await;
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/dishes/{}/badges", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b["label"] == "MVP"));
}

#[tokio::test]
async fn test_update_cannot_steal_claim() {
    let fixture = TestFixture::new().await;
    let dish = fixture.create_dish("Gravy", &[]).await;
    let id = dish["id"].as_str().unwrap();
    fixture.claim(id, "Alice").await;

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/admin/dishes/{}", id)))
        .header("x-api-key", ADMIN_KEY)
        .json(&json!({ "claimedBy": "Mallory" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "ALREADY_CLAIMED");
}

#[tokio::test]
async fn test_delete_dish() {
    let fixture = TestFixture::new().await;
    let dish = fixture.create_dish("Mashed Potatoes", &[]).await;
    let path = format!("/api/admin/dishes/{}", dish["id"].as_str().unwrap());

    let resp = fixture
        .client
        .delete(fixture.url(&path))
        .header("x-api-key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .delete(fixture.url(&path))
        .header("x-api-key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_gallery_upload_and_list() {
    let fixture = TestFixture::new().await;

    let resp = fixture.upload("Dana", vec![0xFF; 128], "image/jpeg").await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let photo = body["data"].clone();
    assert_eq!(photo["personName"], "Dana");
    assert_eq!(photo["originalPhotoUrl"], "https://blobs.test/family.jpg");
    assert!(photo["thanksgivingPhotoUrl"].is_null());

    let resp = fixture
        .client
        .get(fixture.url("/api/gallery"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], json!([photo]));
    assert_eq!(fixture.blobs.stored(), 1);
}

#[tokio::test]
async fn test_gallery_upload_rejections() {
    let fixture = TestFixture::new().await;

    let resp = fixture.upload("Dana", b"hello".to_vec(), "text/plain").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let resp = fixture
        .upload("Dana", vec![0xFF; MAX_UPLOAD_BYTES + 1], "image/png")
        .await;
    assert_eq!(resp.status(), 413);

    let resp = fixture.upload("", vec![0xFF; 16], "image/png").await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .client
        .post(fixture.url("/api/gallery/upload"))
        .multipart(Form::new().text("personName", "Dana"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    assert_eq!(fixture.blobs.stored(), 0);
}

#[tokio::test]
async fn test_thanksgivingify_once() {
    let fixture = TestFixture::new().await;
    let resp = fixture.upload("Dana", vec![0xFF; 64], "image/png").await;
    let body: Value = resp.json().await.unwrap();
    let path = format!(
        "/api/gallery/{}/thanksgiving-ify",
        body["data"]["id"].as_str().unwrap()
    );

    let resp = fixture.client.post(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["data"]["thanksgivingPhotoUrl"],
        "https://images.test/themed/1.png"
    );

    let resp = fixture.client.post(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 409);
    assert_eq!(fixture.images.transformed(), 1);

    let resp = fixture
        .client
        .post(fixture.url("/api/gallery/photo_missing/thanksgiving-ify"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_delete_photo() {
    let fixture = TestFixture::new().await;
    let resp = fixture.upload("Dana", vec![0xFF; 64], "image/png").await;
    let body: Value = resp.json().await.unwrap();
    let path = format!("/api/gallery/{}", body["data"]["id"].as_str().unwrap());

    let resp = fixture.client.delete(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture.client.delete(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .get(fixture.url("/api/gallery"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], json!([]));
}
