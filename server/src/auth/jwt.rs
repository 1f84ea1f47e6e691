//! JWT Token Generation and Validation
//!
//! HS256 with a shared secret taken from [`JwtSettings`]. Only HS256 is
//! accepted on verification, so a token re-signed with any other algorithm
//! (including HS384/HS512 over the same secret) is rejected.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{AuthError, AuthResult};
use crate::config::JwtSettings;
use crate::db::{Role, User};

/// JWT claims for access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Email at issuance. May be stale.
    pub email: String,
    /// Role at issuance. May be stale.
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Not valid before (Unix timestamp).
    pub nbf: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Unique token ID. Not tracked server-side.
    pub jti: Uuid,
    /// Issuer label.
    pub iss: String,
    /// Token kind.
    pub typ: TokenKind,
}

/// Token kind discriminator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Access token, accepted on every protected route.
    Access,
    /// Longer-lived token, accepted only by the refresh endpoint.
    Refresh,
}

/// Token pair returned after successful authentication.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Issues and verifies signed tokens.
///
/// Built once at startup and shared through `AuthService`.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            issuer: settings.issuer.clone(),
            access_ttl: settings.access_expiry,
            refresh_ttl: settings.refresh_expiry,
        }
    }

    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Issue a single token.
    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthResult<String> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AuthError::Internal(format!("Token TTL out of range: {e}")))?;
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal("Token expiry out of range".into()))?;

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
            iss: self.issuer.clone(),
            typ: kind,
        };

        self.sign(&claims)
    }

    /// Issue an access token and a refresh token for `user`.
    pub fn issue_pair(&self, user: &User) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(user.id, &user.email, user.role, TokenKind::Access, self.access_ttl)?,
            refresh_token: self.issue(
                user.id,
                &user.email,
                user.role,
                TokenKind::Refresh,
                self.refresh_ttl,
            )?,
            expires_in: self.access_ttl.as_secs(),
        })
    }

    /// Verify signature, algorithm, time window and issuer, then check that the
    /// token kind is one of `accepted`.
    pub fn verify(&self, token: &str, accepted: &[TokenKind]) -> AuthResult<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;

        if !accepted.contains(&token_data.claims.typ) {
            return Err(AuthError::InvalidToken);
        }

        Ok(token_data.claims)
    }

    fn sign(&self, claims: &Claims) -> AuthResult<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }
}
