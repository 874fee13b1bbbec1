//! Common test utilities for in-process API testing.
//!
//! The fixture builds the real router over an in-memory (or mock) store with
//! session-token auth for two users, so collection isolation can be checked
//! through HTTP.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use ticketdesk_core::config::{
    AuthConfig, AuthMethod, Config, DatabaseConfig, EngineConfig, ServerConfig, SessionConfig,
};
use ticketdesk_core::{
    create_authenticator, testing::MockTicketStore, Authenticator, TicketEngine, TicketStore,
};
use ticketdesk_server::{api::create_router, state::AppState};

pub const ALICE_TOKEN: &str = "tok-alice";
pub const BOB_TOKEN: &str = "tok-bob";

/// Test fixture for in-process API tests.
///
/// ```rust,ignore
/// let fixture = TestFixture::new();
/// let response = fixture.post("/api/v1/tickets", json!({"title": "t", "description": "d"})).await;
/// assert_eq!(response.status, StatusCode::CREATED);
/// ```
pub struct TestFixture {
    pub router: Router,
    pub engine: TicketEngine,
    /// Store behind the engine; toggle failures to simulate a backend outage.
    pub store: Arc<MockTicketStore>,
    /// Token sent by the request helpers.
    pub token: Option<String>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub fn test_config() -> Config {
    Config {
        auth: AuthConfig {
            method: AuthMethod::SessionToken,
            sessions: vec![
                SessionConfig {
                    token: ALICE_TOKEN.to_string(),
                    user_id: "alice".to_string(),
                },
                SessionConfig {
                    token: BOB_TOKEN.to_string(),
                    user_id: "bob".to_string(),
                },
            ],
        },
        server: ServerConfig {
            host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 0,
        },
        database: DatabaseConfig::default(),
        engine: EngineConfig::default(),
    }
}

impl TestFixture {
    /// Fixture acting as alice.
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MockTicketStore::new());
        let engine = TicketEngine::new(
            Arc::clone(&store) as Arc<dyn TicketStore>,
            config.engine.clone(),
        );
        let authenticator: Arc<dyn Authenticator> =
            Arc::from(create_authenticator(&config.auth).expect("Failed to create authenticator"));
        let state = Arc::new(AppState::new(config, authenticator, engine.clone()));

        Self {
            router: create_router(state),
            engine,
            store,
            token: Some(ALICE_TOKEN.to_string()),
        }
    }

    /// Same server, different caller.
    pub fn as_user(&self, token: Option<&str>) -> Self {
        Self {
            router: self.router.clone(),
            engine: self.engine.clone(),
            store: Arc::clone(&self.store),
            token: token.map(str::to_string),
        }
    }

    /// Serve the router on an ephemeral local port.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .ok();
        });
        addr
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.send("POST", path, Body::from(body.to_string()), true)
            .await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        match body {
            Some(json) => {
                let bytes = serde_json::to_vec(&json).expect("Failed to encode body");
                self.send(method, path, Body::from(bytes), true).await
            }
            None => self.send(method, path, Body::empty(), false).await,
        }
    }

    async fn send(&self, method: &str, path: &str, body: Body, json: bool) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if json {
            builder = builder.header("Content-Type", "application/json");
        }
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body).expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
