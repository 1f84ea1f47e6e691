//! Authentication Service
//!
//! Password hashing, bearer tokens, account registration and login, and the
//! middleware that gates protected routes.

mod error;
mod handlers;
pub mod jwt;
mod middleware;
mod password;
mod service;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};

use crate::api::AppState;
use crate::db::Role;

pub use error::{AuthError, AuthResult};
pub use jwt::{Claims, TokenIssuer, TokenKind, TokenPair};
pub use middleware::{optional_auth, require_auth, require_refresh_auth, require_role, AuthUser};
pub use password::{hash_password, verify_password};
pub use service::{
    AuthResponse, AuthService, AuthSession, ChangeRoleRequest, LoginRequest, RegisterRequest,
    UpdateProfileRequest, UserResponse,
};

/// Roles allowed to change other accounts' roles.
const ROLE_ADMINS: &[Role] = &[Role::Admin];

/// Create authentication router.
///
/// Public routes:
/// - POST /register - Register a new user
/// - POST /login - Login with email/password
///
/// Protected routes (access token):
/// - POST /logout - Client-side logout acknowledgement
/// - GET /me - Current user profile
/// - PUT /me - Update name/household
/// - PUT /users/{id}/role - Change a user's role (admin)
///
/// POST /refresh accepts an access or refresh token.
pub fn router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login));

    let refresh_route = Router::new()
        .route("/refresh", post(handlers::refresh))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_refresh_auth,
        ));

    let admin_routes = Router::new()
        .route("/users/{id}/role", put(handlers::change_role))
        .layer(axum_middleware::from_fn(require_role(ROLE_ADMINS)));

    let protected_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::get_profile).put(handlers::update_profile))
        .merge(admin_routes)
        .layer(axum_middleware::from_fn_with_state(state, require_auth));

    public_routes.merge(refresh_route).merge(protected_routes)
}
