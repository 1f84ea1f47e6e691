//! Database Models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Registered account.
///
/// Deliberately not `Serialize`: the password hash must never leave the
/// server. Use `auth::UserResponse` for outward projections.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub household_id: Option<Uuid>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Family,
    Restaurant,
    Shop,
    Ngo,
    Admin,
}

impl Role {
    /// Every recognized role, in display order.
    pub const ALL: [Self; 5] = [
        Self::Family,
        Self::Restaurant,
        Self::Shop,
        Self::Ngo,
        Self::Admin,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Restaurant => "restaurant",
            Self::Shop => "shop",
            Self::Ngo => "ngo",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Values for inserting a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub household_id: Option<Uuid>,
    pub role: Role,
}

/// Partial update of an account. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the household reference.
    pub household_id: Option<Option<Uuid>>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.household_id.is_none() && self.role.is_none()
    }
}
