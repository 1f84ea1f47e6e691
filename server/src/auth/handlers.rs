//! Authentication HTTP Handlers

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use tracing::debug;
use uuid::Uuid;

use super::error::{AuthError, AuthResult};
use super::middleware::AuthUser;
use super::service::{
    AuthResponse, ChangeRoleRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
    UserResponse,
};
use crate::api::response::ApiResponse;
use crate::api::AppState;

/// Unwrap a JSON body, mapping any rejection to a 400 envelope.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AuthResult<T> {
    body.map(|Json(inner)| inner).map_err(|e| {
        debug!(error = %e, "Rejected request body");
        AuthError::BadRequest("Invalid request body".to_string())
    })
}

/// Register a new account.
///
/// POST /api/v1/auth/register
#[tracing::instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AuthResult<ApiResponse<AuthResponse>> {
    let session = state.auth.register(json_body(body)?).await?;
    Ok(ApiResponse::created(
        "User registered successfully",
        AuthResponse::from(session),
    ))
}

/// Log in with email and password.
///
/// POST /api/v1/auth/login
#[tracing::instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<ApiResponse<AuthResponse>> {
    let session = state.auth.login(json_body(body)?).await?;
    Ok(ApiResponse::ok("Login successful", AuthResponse::from(session)))
}

/// Log out. Tokens are stateless, so the client simply discards them.
///
/// POST /api/v1/auth/logout
#[tracing::instrument(skip_all, fields(user_id = %auth.id))]
pub async fn logout(auth: AuthUser) -> ApiResponse<()> {
    ApiResponse::message("Logged out successfully")
}

/// Issue a new token pair for the bearer of an access or refresh token.
///
/// POST /api/v1/auth/refresh
#[tracing::instrument(skip_all, fields(user_id = %auth.id))]
pub async fn refresh(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AuthResult<ApiResponse<AuthResponse>> {
    let session = state.auth.refresh(&auth).await?;
    Ok(ApiResponse::ok(
        "Token refreshed successfully",
        AuthResponse::from(session),
    ))
}

/// Current user profile.
///
/// GET /api/v1/auth/me
#[tracing::instrument(skip_all, fields(user_id = %auth.id))]
pub async fn get_profile(auth: AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok("User retrieved successfully", UserResponse::from(&auth))
}

/// Update name and/or household of the current user.
///
/// PUT /api/v1/auth/me
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> AuthResult<ApiResponse<UserResponse>> {
    let user = state.auth.update_profile(auth.id, json_body(body)?).await?;
    Ok(ApiResponse::ok(
        "Profile updated successfully",
        UserResponse::from(&user),
    ))
}

/// Change another account's role. Admin only.
///
/// PUT /api/v1/auth/users/{id}/role
#[tracing::instrument(skip(state, path, body), fields(admin_id = %auth.id))]
pub async fn change_role(
    State(state): State<AppState>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ChangeRoleRequest>, JsonRejection>,
) -> AuthResult<ApiResponse<UserResponse>> {
    let Path(user_id) = path.map_err(|_| AuthError::BadRequest("Invalid user id".to_string()))?;
    let user = state.auth.change_role(user_id, json_body(body)?).await?;
    Ok(ApiResponse::ok(
        "User role updated successfully",
        UserResponse::from(&user),
    ))
}
