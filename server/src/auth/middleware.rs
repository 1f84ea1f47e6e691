//! Authentication Middleware
//!
//! Bearer-token gates and the role gate. A resolved identity travels to
//! handlers as an [`AuthUser`] request extension.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::error::{AuthError, AuthResult};
use super::jwt::TokenKind;
use crate::api::AppState;
use crate::db::{Role, User};

/// Authenticated user injected into request extensions.
///
/// Everything from [`User`] except the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub household_id: Option<Uuid>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            household_id: user.household_id,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// The header must be exactly two space-separated parts with scheme `Bearer`.
fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    match header.split(' ').collect::<Vec<_>>().as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(*token),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap, kinds: &[TokenKind]) -> AuthResult<AuthUser> {
    let token = bearer_token(headers)?;
    let user = state.auth.validate_token_of_kind(token, kinds).await?;
    Ok(AuthUser::from(user))
}

/// Middleware to require authentication with an access token.
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/protected", get(handler))
///     .layer(axum::middleware::from_fn_with_state(state, require_auth))
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_user = authenticate(&state, request.headers(), &[TokenKind::Access]).await?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Like [`require_auth`], but also accepts refresh tokens. Only for the
/// refresh endpoint.
pub async fn require_refresh_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_user = authenticate(
        &state,
        request.headers(),
        &[TokenKind::Access, TokenKind::Refresh],
    )
    .await?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Attach an identity when a valid access token is present; otherwise
/// continue anonymously.
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match authenticate(&state, request.headers(), &[TokenKind::Access]).await {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
        }
        Err(AuthError::MissingAuthHeader) => {}
        Err(e) => debug!(error = %e, "Optional auth failed, continuing anonymously"),
    }
    next.run(request).await
}

/// Role gate. Layer it inside `require_auth`.
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/users/{id}/role", put(handler))
///     .layer(from_fn(require_role(&[Role::Admin])))
///     .layer(from_fn_with_state(state, require_auth))
/// ```
pub fn require_role(
    allowed: &'static [Role],
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone + Send + 'static {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let Some(role) = request.extensions().get::<AuthUser>().map(|u| u.role) else {
                return AuthError::AuthenticationRequired.into_response();
            };

            if !allowed.contains(&role) {
                debug!(%role, "Role gate rejected request");
                return AuthError::InsufficientPermissions.into_response();
            }

            next.run(request).await
        })
    }
}

/// Extractor for the authenticated user in handlers behind [`require_auth`].
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::AuthenticationRequired)
    }
}

/// `Option<AuthUser>` for handlers behind [`optional_auth`].
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned())
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware::from_fn,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[test]
    fn test_malformed_headers() {
        for value in ["abc.def.ghi", "Basic abc", "bearer abc", "Bearer", "Bearer ", "Bearer a b"] {
            assert!(
                matches!(bearer_token(&headers_with(value)), Err(AuthError::InvalidAuthHeader)),
                "{value:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_role_gate_without_identity_is_unauthorized() {
        let app = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .layer(from_fn(require_role(&[Role::Admin])));

        let response = app
            .oneshot(axum::http::Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message"], "Authentication required");
        assert_eq!(json["error"]["kind"], "UNAUTHORIZED");
    }
}
