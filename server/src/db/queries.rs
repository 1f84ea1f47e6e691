//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! All query functions include error context logging to aid debugging.

use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder};
use tracing::error;
use uuid::Uuid;

use super::models::{NewUser, User, UserUpdate};
use super::{StoreError, StoreResult, UserStore};

/// Name of the unique constraint guarding `users.email`.
const USERS_EMAIL_KEY: &str = "users_email_key";

/// Log and return a database error with context.
macro_rules! db_error {
    ($query:expr, $($field:tt)*) => {
        |e| {
            error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

// ============================================================================
// User Queries
// ============================================================================

/// Find user by ID.
pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_id", user_id = %id))
}

/// Find user by email (exact, case-sensitive match).
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_email", email = %email))
}

/// Check if email exists.
pub async fn email_exists(pool: &PgPool, email: &str) -> sqlx::Result<bool> {
    let result: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await
        .map_err(db_error!("email_exists", email = %email))?;

    Ok(result.0)
}

/// Create a new user.
///
/// Returns `StoreError::DuplicateEmail` when the unique constraint fires,
/// which is how concurrent registrations of the same email are settled.
pub async fn create_user(pool: &PgPool, new_user: &NewUser) -> StoreResult<User> {
    sqlx::query_as::<_, User>(
        r"
        INSERT INTO users (id, email, name, password_hash, household_id, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(new_user.id)
    .bind(&new_user.email)
    .bind(&new_user.name)
    .bind(&new_user.password_hash)
    .bind(new_user.household_id)
    .bind(new_user.role)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_email_violation(&e) {
            return StoreError::DuplicateEmail;
        }
        error!(query = "create_user", user_id = %new_user.id, error = %e, "Database query failed");
        StoreError::Database(e)
    })
}

/// Update name, household and/or role.
///
/// Only `Some` fields are written. Returns `None` if the user does not exist.
pub async fn update_user(
    pool: &PgPool,
    user_id: Uuid,
    update: &UserUpdate,
) -> sqlx::Result<Option<User>> {
    let mut builder = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

    if let Some(name) = &update.name {
        builder.push(", name = ").push_bind(name);
    }
    if let Some(household_id) = update.household_id {
        builder.push(", household_id = ").push_bind(household_id);
    }
    if let Some(role) = update.role {
        builder.push(", role = ").push_bind(role);
    }

    builder
        .push(" WHERE id = ")
        .push_bind(user_id)
        .push(" RETURNING *");

    builder
        .build_query_as::<User>()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("update_user", user_id = %user_id))
}

fn is_email_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                && db_err.constraint().map_or(true, |c| c == USERS_EMAIL_KEY)
        }
        _ => false,
    }
}

// ============================================================================
// Store
// ============================================================================

/// `PostgreSQL`-backed user store.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(find_user_by_id(&self.pool, id).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(find_user_by_email(&self.pool, email).await?)
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(email_exists(&self.pool, email).await?)
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        create_user(&self.pool, &new_user).await
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>> {
        Ok(update_user(&self.pool, id, &update).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error!("ping", pool_size = self.pool.size()))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
