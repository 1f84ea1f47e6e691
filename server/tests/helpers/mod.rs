//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum
//! router backed by the in-memory user store, plus utilities for registering
//! users and minting tokens.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::Utc;
use foodlink_server::api::{create_router, AppState};
use foodlink_server::auth::{Claims, TokenKind};
use foodlink_server::config::Config;
use foodlink_server::db::{MemoryUserStore, Role};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

/// Password used by [`TestApp::register`].
pub const TEST_PASSWORD: &str = "password1";

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a new test app with the default test config.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config.
    pub fn with_config(config: Config) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let state = AppState::new(config, users.clone());
        let router = create_router(state.clone());
        let config = Arc::clone(&state.config);

        Self {
            router,
            state,
            users,
            config,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a JSON body, optionally with a bearer token.
    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Response<Body> {
        let mut builder = Self::request(method, uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Send a body-less request, optionally with a bearer token.
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut builder = Self::request(method, uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.oneshot(builder.body(Body::empty()).unwrap()).await
    }

    /// Register a user and return `(user_id, access_token, refresh_token)`.
    pub async fn register(&self, email: &str, role: Option<&str>) -> (Uuid, String, String) {
        let mut body = json!({
            "email": email,
            "name": "Test User",
            "password": TEST_PASSWORD,
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }

        let response = self
            .send_json(Method::POST, "/api/v1/auth/register", None, &body)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "registration failed");

        let json = body_to_json(response).await;
        let user_id = json["data"]["user"]["id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .expect("user id in response");
        (
            user_id,
            json["data"]["access_token"].as_str().unwrap().to_string(),
            json["data"]["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    /// Sign arbitrary claims with the app's secret.
    pub fn sign(&self, claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.jwt.secret.as_bytes()),
        )
        .expect("Failed to sign claims")
    }

    /// Access-token claims for `user_id` whose window is offset from now.
    pub fn claims_for(&self, user_id: Uuid, nbf_offset: i64, exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: user_id,
            email: "claims@x.com".into(),
            role: Role::Family,
            iat: now,
            nbf: now + nbf_offset,
            exp: now + exp_offset,
            jti: Uuid::new_v4(),
            iss: self.config.jwt.issuer.clone(),
            typ: TokenKind::Access,
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
