//! API Router and Application State
//!
//! Central routing configuration and shared state.

pub mod response;

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{header, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info_span, warn, Span};

use crate::auth::{
    self, optional_auth, AuthError, AuthService, AuthUser, TokenIssuer, UserResponse,
};
use crate::config::Config;
use crate::db::UserStore;

use self::response::{stamp_request_id, ApiResponse, REQUEST_ID_HEADER};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<AuthService>,
    /// Credential store
    pub users: Arc<dyn UserStore>,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(config: Config, users: Arc<dyn UserStore>) -> Self {
        let tokens = TokenIssuer::new(&config.jwt);
        Self {
            auth: Arc::new(AuthService::new(Arc::clone(&users), tokens)),
            users,
            config: Arc::new(config),
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Welcome, personalized when a valid token is sent
        .route(
            "/api/v1",
            get(api_v1).route_layer(from_fn_with_state(state.clone(), optional_auth)),
        )
        .nest("/api/v1/auth", auth::router(state.clone()))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state);

    with_middleware(routes)
}

/// Wrap `router` in the shared middleware stack: request id, tracing, CORS,
/// error-envelope stamping and panic recovery.
pub fn with_middleware(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, REQUEST_ID_HEADER])
        .expose_headers([REQUEST_ID_HEADER]);

    // Outermost first
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(from_fn(stamp_request_id))
            .layer(CatchPanicLayer::custom(recover_panic)),
    )
}

/// Turn a handler panic into a 500 envelope.
fn recover_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");

    AuthError::Internal(format!("handler panicked: {detail}")).into_response()
}

async fn not_found() -> AuthError {
    AuthError::NotFound
}

async fn method_not_allowed() -> AuthError {
    AuthError::MethodNotAllowed
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// `connected` or `disconnected`
    database: &'static str,
    /// Store backend in use
    backend: &'static str,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    let database = match state.users.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!(error = %e, "Health check: store unreachable");
            "disconnected"
        }
    };

    ApiResponse::ok(
        "Server is healthy",
        HealthResponse {
            status: "ok",
            database,
            backend: state.users.backend(),
        },
    )
}

/// API welcome response.
#[derive(Debug, Serialize)]
struct WelcomeResponse {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserResponse>,
}

/// GET /api/v1
async fn api_v1(auth: Option<AuthUser>) -> ApiResponse<WelcomeResponse> {
    ApiResponse::ok(
        "API v1",
        WelcomeResponse {
            message: "Welcome to Foodlink API v1",
            user: auth.as_ref().map(UserResponse::from),
        },
    )
}
