use divesite_catalog::{
    AppConfig, AppState, InMemoryRepository, create_router,
    models::{MarineLifeType, Role},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
}

/// Serves the full router on an ephemeral port, backed by the in-memory store.
async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: repo.clone(),
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, repo }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;

    let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["paths"]["/sites/{slug}/reviews"]["post"].is_object());
    assert!(doc["paths"]["/sites"]["get"].is_object());
}

#[tokio::test]
async fn test_diver_journey_over_http() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let guide = app.repo.add_user("Guide", Role::Guide);
    app.repo.add_site("Blue Hole", guide.id);
    let turtle = app.repo.add_marine_life("Green Turtle", MarineLifeType::Reptile);

    // Register and sign in as a new diver.
    let registered: Value = client
        .post(format!("{}/auth/register", app.address))
        .json(&json!({ "email": "ana@reef.io", "password": "bubbles-123", "name": "Ana" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = registered["token"].as_str().unwrap().to_string();

    // Guests only see the public tier.
    let guest: Value = client
        .get(format!("{}/sites/blue-hole", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(guest.get("reviews").is_none());

    // Review the site once; the second attempt conflicts.
    let body = json!({ "rating": 9, "content": "Sharks at the rim" });
    let first = client
        .post(format!("{}/sites/blue-hole/reviews", app.address))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::CREATED);

    let second = client
        .post(format!("{}/sites/blue-hole/reviews", app.address))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);

    // The member tier now carries the review and its average.
    let member: Value = client
        .get(format!("{}/sites/blue-hole", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(member["averageRating"], 9.0);
    assert_eq!(member["reviews"][0]["user"]["name"], "Ana");

    // A plain diver cannot curate marine life.
    let forbidden = client
        .post(format!("{}/sites/blue-hole/marine-life", app.address))
        .bearer_auth(&token)
        .json(&json!({ "marineLifeIds": [turtle.id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), reqwest::StatusCode::FORBIDDEN);
}
