//! In-process tests for the ticket REST API.

mod common;

use axum::http::StatusCode;
use common::{TestFixture, BOB_TOKEN};
use serde_json::{json, Value};

async fn create(fixture: &TestFixture, body: Value) -> Value {
    let response = fixture.post("/api/v1/tickets", body).await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body
}

fn titles(body: &Value) -> Vec<&str> {
    body["tickets"]
        .as_array()
        .expect("tickets array")
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_create_ticket_defaults() {
    let fixture = TestFixture::new();

    let ticket = create(
        &fixture,
        json!({"title": "Build fails", "description": "CI is red"}),
    )
    .await;

    assert!(!ticket["id"].as_str().unwrap().is_empty());
    assert_eq!(ticket["title"], "Build fails");
    assert_eq!(ticket["priority"], "Medium");
    assert_eq!(ticket["status"], "Open");
    assert!(ticket["createdAt"].is_string());
    assert!(ticket.get("updatedAt").is_none());
}

#[tokio::test]
async fn test_create_ticket_validation() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/api/v1/tickets", json!({"title": "  ", "description": "d"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["kind"], "validation");
    assert_eq!(response.body["retryable"], false);

    let response = fixture
        .post("/api/v1/tickets", json!({"title": "t"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture
        .post(
            "/api/v1/tickets",
            json!({"title": "t", "description": "d", "priority": "Urgent"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["kind"], "validation");

    // Nothing was stored
    let list = fixture.get("/api/v1/tickets").await;
    assert_eq!(list.body["total"], 0);
    assert_eq!(list.body["version"], 0);
}

#[tokio::test]
async fn test_create_ticket_malformed_json() {
    let fixture = TestFixture::new();

    let response = fixture.post_raw("/api/v1/tickets", "{not json").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["kind"], "validation");
}

#[tokio::test]
async fn test_get_unknown_ticket() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/tickets/does-not-exist").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["kind"], "not_found");
}

#[tokio::test]
async fn test_patch_merges_fields() {
    let fixture = TestFixture::new();
    let ticket = create(
        &fixture,
        json!({"title": "Printer jam", "description": "Floor 2", "priority": "Low"}),
    )
    .await;
    let path = format!("/api/v1/tickets/{}", ticket["id"].as_str().unwrap());

    let response = fixture
        .patch(&path, json!({"status": "In Progress"}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "In Progress");
    assert_eq!(response.body["title"], "Printer jam");
    assert_eq!(response.body["priority"], "Low");
    assert_eq!(response.body["createdAt"], ticket["createdAt"]);
    assert!(response.body["updatedAt"].is_string());

    let fetched = fixture.get(&path).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, response.body);

    let response = fixture.patch(&path, json!({"status": "Resolved"})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture
        .patch("/api/v1/tickets/missing", json!({"title": "x"}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_ticket() {
    let fixture = TestFixture::new();
    let ticket = create(&fixture, json!({"title": "t", "description": "d"})).await;
    let path = format!("/api/v1/tickets/{}", ticket["id"].as_str().unwrap());

    let response = fixture.delete(&path).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    assert_eq!(fixture.get(&path).await.status, StatusCode::NOT_FOUND);
    assert_eq!(fixture.delete(&path).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_ordering_filter_and_pagination() {
    let fixture = TestFixture::new();
    create(
        &fixture,
        json!({"title": "low", "description": "d", "priority": "Low"}),
    )
    .await;
    create(
        &fixture,
        json!({"title": "closed high", "description": "d", "priority": "High", "status": "Closed"}),
    )
    .await;
    create(
        &fixture,
        json!({"title": "high", "description": "printer on fire", "priority": "High"}),
    )
    .await;
    create(&fixture, json!({"title": "medium", "description": "d"})).await;

    let response = fixture.get("/api/v1/tickets").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["version"], 4);
    assert_eq!(response.body["total"], 4);
    // Open before anything else, then by priority
    assert_eq!(titles(&response.body), ["high", "medium", "low", "closed high"]);

    let response = fixture.get("/api/v1/tickets?status=Closed").await;
    assert_eq!(titles(&response.body), ["closed high"]);

    let response = fixture.get("/api/v1/tickets?q=PRINTER").await;
    assert_eq!(titles(&response.body), ["high"]);

    let response = fixture.get("/api/v1/tickets?limit=2&offset=1").await;
    assert_eq!(response.body["total"], 4);
    assert_eq!(response.body["limit"], 2);
    assert_eq!(titles(&response.body), ["medium", "low"]);

    let response = fixture.get("/api/v1/tickets?status=Pending").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ticket_stats() {
    let fixture = TestFixture::new();
    create(&fixture, json!({"title": "a", "description": "d"})).await;
    create(
        &fixture,
        json!({"title": "b", "description": "d", "status": "In Progress"}),
    )
    .await;
    create(
        &fixture,
        json!({"title": "c", "description": "d", "status": "Closed"}),
    )
    .await;

    let response = fixture.get("/api/v1/tickets/stats").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["version"], 3);
    assert_eq!(response.body["total"], 3);
    assert_eq!(response.body["open"], 1);
    assert_eq!(response.body["in_progress"], 1);
    assert_eq!(response.body["closed"], 1);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let alice = TestFixture::new();
    let bob = alice.as_user(Some(BOB_TOKEN));

    let ticket = create(&alice, json!({"title": "alice's", "description": "d"})).await;
    let path = format!("/api/v1/tickets/{}", ticket["id"].as_str().unwrap());

    let list = bob.get("/api/v1/tickets").await;
    assert_eq!(list.body["total"], 0);
    assert_eq!(bob.get(&path).await.status, StatusCode::NOT_FOUND);
    assert_eq!(bob.delete(&path).await.status, StatusCode::NOT_FOUND);

    assert_eq!(alice.get(&path).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_requires_session_token() {
    let fixture = TestFixture::new();

    let anonymous = fixture.as_user(None);
    assert_eq!(
        anonymous.get("/api/v1/tickets").await.status,
        StatusCode::UNAUTHORIZED
    );

    let mallory = fixture.as_user(Some("tok-mallory"));
    assert_eq!(
        mallory
            .post("/api/v1/tickets", json!({"title": "t", "description": "d"}))
            .await
            .status,
        StatusCode::UNAUTHORIZED
    );

    // Health stays public
    assert_eq!(anonymous.get("/api/v1/health").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_backend_outage_returns_service_unavailable() {
    let fixture = TestFixture::new();
    fixture.store.fail_writes(true);

    let response = fixture
        .post("/api/v1/tickets", json!({"title": "t", "description": "d"}))
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["kind"], "backend_unavailable");

    fixture.store.fail_writes(false);
    create(&fixture, json!({"title": "t", "description": "d"})).await;
}

#[tokio::test]
async fn test_health_reports_active_collections() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["active_collections"], 0);

    create(&fixture, json!({"title": "t", "description": "d"})).await;

    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.body["active_collections"], 1);
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["auth"]["sessions_configured"], 2);
    assert!(!response.body.to_string().contains("tok-alice"));
}
