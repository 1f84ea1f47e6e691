//! Authentication Service
//!
//! Registration, login, token validation and profile updates over a
//! [`UserStore`] and a [`TokenIssuer`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::error::{AuthError, AuthResult};
use super::jwt::{TokenIssuer, TokenKind, TokenPair};
use super::middleware::AuthUser;
use super::password::{dummy_verify, hash_password, verify_password};
use crate::db::{NewUser, Role, User, UserStore, UserUpdate};

// ============================================================================
// Request Types
// ============================================================================

/// Registration request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 2, max = 255, message = "must be between 2 and 255 characters"))]
    pub name: String,

    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,

    /// Empty or absent means `family`.
    pub role: Option<String>,
}

/// Login request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Profile update. Absent fields are left unchanged; `"household_id": null`
/// clears the household reference.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 255, message = "must be between 2 and 255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub household_id: Option<Option<Uuid>>,
}

/// Role change request.
#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

/// Maps a present field (even `null`) to `Some`, so absence stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Response Types
// ============================================================================

/// Outward projection of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household_id: Option<Uuid>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            household_id: user.household_id,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<&AuthUser> for UserResponse {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            household_id: user.household_id,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Body of register, login and refresh responses.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Account plus freshly issued tokens.
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: UserResponse::from(&session.user),
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
            token_type: "Bearer",
            expires_in: session.tokens.expires_in,
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Orchestrates the credential store, password hasher and token issuer.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    tokens: TokenIssuer,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("store", &self.store.backend())
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    pub const fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Create an account and sign it in.
    pub async fn register(&self, req: RegisterRequest) -> AuthResult<AuthSession> {
        req.validate().map_err(validation_error)?;
        let role = parse_role(req.role.as_deref())?.unwrap_or_default();

        if self.store.email_exists(&req.email).await? {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&req.password).map_err(|e| {
            error!(error = %e, "Password hashing failed");
            AuthError::PasswordHash
        })?;

        // A concurrent registration can still win between the check and the
        // insert; the store reports that as DuplicateEmail -> 409.
        let user = self
            .store
            .create(NewUser {
                id: Uuid::now_v7(),
                email: req.email,
                name: req.name,
                password_hash,
                household_id: None,
                role,
            })
            .await?;

        let tokens = self.tokens.issue_pair(&user)?;
        info!(user_id = %user.id, role = %user.role, "User registered");

        Ok(AuthSession { user, tokens })
    }

    /// Check credentials and sign in.
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, req: LoginRequest) -> AuthResult<AuthSession> {
        req.validate().map_err(validation_error)?;

        let Some(user) = self.store.find_by_email(&req.email).await? else {
            dummy_verify(&req.password);
            return Err(AuthError::InvalidCredentials);
        };

        let matches = verify_password(&req.password, &user.password_hash).map_err(|e| {
            error!(user_id = %user.id, error = %e, "Stored password hash is malformed");
            AuthError::PasswordHash
        })?;

        if !matches {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.tokens.issue_pair(&user)?;
        info!(user_id = %user.id, "User logged in");

        Ok(AuthSession { user, tokens })
    }

    /// Resolve an access token to the current account.
    pub async fn validate_token(&self, token: &str) -> AuthResult<User> {
        self.validate_token_of_kind(token, &[TokenKind::Access]).await
    }

    /// Resolve a token of one of `kinds` to the current account.
    ///
    /// The account is re-read so role and email changes since issuance apply.
    /// A valid signature for a vanished account is still `InvalidToken`.
    pub async fn validate_token_of_kind(&self, token: &str, kinds: &[TokenKind]) -> AuthResult<User> {
        let claims = self.tokens.verify(token, kinds)?;

        self.store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Issue a fresh token pair for an already-authenticated identity.
    pub async fn refresh(&self, auth: &AuthUser) -> AuthResult<AuthSession> {
        let user = self
            .store
            .find_by_id(auth.id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let tokens = self.tokens.issue_pair(&user)?;
        Ok(AuthSession { user, tokens })
    }

    /// Update name and/or household reference.
    pub async fn update_profile(&self, user_id: Uuid, req: UpdateProfileRequest) -> AuthResult<User> {
        req.validate().map_err(validation_error)?;

        let update = UserUpdate {
            name: req.name,
            household_id: req.household_id,
            role: None,
        };

        if update.is_empty() {
            return self.store.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound);
        }

        self.store
            .update(user_id, update)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Set an account's role.
    pub async fn change_role(&self, user_id: Uuid, req: ChangeRoleRequest) -> AuthResult<User> {
        let role = parse_role(Some(req.role.as_str()))?.ok_or_else(|| AuthError::Validation(role_hint()))?;

        let user = self
            .store
            .update(
                user_id,
                UserUpdate {
                    role: Some(role),
                    ..UserUpdate::default()
                },
            )
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(user_id = %user.id, role = %role, "User role changed");
        Ok(user)
    }
}

fn role_hint() -> String {
    let names: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
    format!("role must be one of: {}", names.join(", "))
}

/// `None` for an absent or empty role. Whitespace is not empty.
fn parse_role(raw: Option<&str>) -> AuthResult<Option<Role>> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AuthError::Validation(role_hint())),
    }
}

/// Report the first failing field, in field-name order.
fn validation_error(errors: ValidationErrors) -> AuthError {
    let fields = errors.field_errors();
    let mut names: Vec<_> = fields.keys().collect();
    names.sort();

    let message = names
        .first()
        .and_then(|name| {
            let err = fields.get(*name)?.first()?;
            let detail: &str = err.message.as_deref().unwrap_or(&*err.code);
            Some(format!("{name} {detail}"))
        })
        .unwrap_or_else(|| "Validation failed".to_string());

    AuthError::Validation(message)
}
