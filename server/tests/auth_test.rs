//! Authentication integration tests.
//!
//! Covers Argon2id password hashing, token issuance and verification through
//! the public API, and registration/login against PostgreSQL.
//!
//! Run with: `cargo test --test auth_test`
//! Run ignored (integration) tests: `cargo test --test auth_test -- --ignored`

use std::sync::Arc;
use std::time::Duration;

use foodlink_server::auth::{
    hash_password, verify_password, AuthError, AuthService, LoginRequest, RegisterRequest,
    TokenIssuer, TokenKind,
};
use foodlink_server::config::{Config, JwtSettings};
use foodlink_server::db::{self, PgUserStore, Role};
use uuid::Uuid;

// ============================================================================
// Password Hashing Tests (Unit tests - no database required)
// ============================================================================

#[test]
fn test_password_hash_is_argon2id_with_fixed_cost() {
    let hash = hash_password("password1").expect("Hashing should succeed");

    assert!(
        hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"),
        "unexpected PHC prefix: {hash}"
    );
    assert!(!hash.contains("password1"));
}

#[test]
fn test_password_round_trip_for_varied_inputs() {
    let long = "x".repeat(1000);
    for password in ["password1", "Pässwörter-Küche", "密码🔐パスワード", long.as_str()] {
        let hash = hash_password(password).expect("Hashing should succeed");
        assert!(verify_password(password, &hash).unwrap(), "{password:?} should verify");
        assert!(!verify_password("password2", &hash).unwrap());
    }
}

#[test]
fn test_same_password_gets_fresh_salt() {
    let first = hash_password("password1").unwrap();
    let second = hash_password("password1").unwrap();

    assert_ne!(first, second);
    assert!(verify_password("password1", &first).unwrap());
    assert!(verify_password("password1", &second).unwrap());
}

#[test]
fn test_bcrypt_hash_is_rejected_as_malformed() {
    // Unusable hash, not a mismatch.
    let bcrypt = "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";
    assert!(verify_password("password1", bcrypt).is_err());
    assert!(verify_password("password1", "plaintext").is_err());
}

// ============================================================================
// Token Tests (Unit tests - no database required)
// ============================================================================

fn jwt_settings(secret: &str, access_secs: u64) -> JwtSettings {
    JwtSettings {
        secret: secret.into(),
        issuer: "foodlink-backend".into(),
        access_expiry: Duration::from_secs(access_secs),
        refresh_expiry: Duration::from_secs(access_secs * 2),
    }
}

#[test]
fn test_token_valid_immediately_after_issuance() {
    let issuer = TokenIssuer::new(&jwt_settings("secret-a", 60));
    let user_id = Uuid::now_v7();

    let token = issuer
        .issue(user_id, "a@x.com", Role::Family, TokenKind::Access, issuer.access_ttl())
        .unwrap();
    let claims = issuer.verify(&token, &[TokenKind::Access]).unwrap();

    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.exp - claims.iat, 60);
}

#[test]
fn test_token_from_other_secret_always_rejected() {
    let ours = TokenIssuer::new(&jwt_settings("secret-a", 3600));
    let theirs = TokenIssuer::new(&jwt_settings("secret-b", 3600));

    let token = theirs
        .issue(Uuid::now_v7(), "a@x.com", Role::Admin, TokenKind::Access, theirs.access_ttl())
        .unwrap();

    let result = ours.verify(&token, &[TokenKind::Access, TokenKind::Refresh]);
    assert!(matches!(result, Err(AuthError::InvalidToken)));
}

#[tokio::test]
async fn test_token_expires_after_ttl() {
    let issuer = TokenIssuer::new(&jwt_settings("secret-a", 1));
    let token = issuer
        .issue(Uuid::now_v7(), "a@x.com", Role::Family, TokenKind::Access, Duration::from_secs(1))
        .unwrap();

    assert!(issuer.verify(&token, &[TokenKind::Access]).is_ok());

    tokio::time::sleep(Duration::from_millis(2100)).await;

    let result = issuer.verify(&token, &[TokenKind::Access]);
    assert!(matches!(result, Err(AuthError::TokenExpired)));
}

// ============================================================================
// Integration Tests (require database - marked as #[ignore])
// ============================================================================

/// Helper to create a migrated test database pool.
async fn create_test_store() -> Arc<PgUserStore> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/foodlink_test".into());
    let config = Config::default_for_test();

    let pool = db::create_pool(&database_url, &config)
        .await
        .expect("Failed to connect to test database");
    db::run_migrations(&pool).await.expect("Migrations failed");

    Arc::new(PgUserStore::new(pool))
}

fn test_service(store: Arc<PgUserStore>) -> AuthService {
    AuthService::new(store, TokenIssuer::new(&Config::default_for_test().jwt))
}

async fn cleanup(store: &PgUserStore, user_id: Uuid) {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(store.pool())
        .await
        .ok();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_register_and_login_against_postgres() {
    let store = create_test_store().await;
    let service = test_service(Arc::clone(&store));
    let email = format!("pg_{}@example.com", Uuid::new_v4());

    let session = service
        .register(RegisterRequest {
            email: email.clone(),
            name: "Postgres User".into(),
            password: "password1".into(),
            role: Some("shop".into()),
        })
        .await
        .expect("Registration should succeed");
    assert_eq!(session.user.role, Role::Shop);

    let login = service
        .login(LoginRequest {
            email: email.clone(),
            password: "password1".into(),
        })
        .await
        .expect("Login should succeed");
    assert_eq!(login.user.id, session.user.id);

    let user = service
        .validate_token(&login.tokens.access_token)
        .await
        .expect("Token should validate");
    assert_eq!(user.email, email);

    cleanup(&store, session.user.id).await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_concurrent_registration_against_postgres() {
    let store = create_test_store().await;
    let service = Arc::new(test_service(Arc::clone(&store)));
    let email = format!("race_{}@example.com", Uuid::new_v4());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        let email = email.clone();
        tasks.spawn(async move {
            service
                .register(RegisterRequest {
                    email,
                    name: "Racer".into(),
                    password: "password1".into(),
                    role: None,
                })
                .await
        });
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(session) => winners.push(session.user.id),
            Err(AuthError::UserAlreadyExists) => conflicts += 1,
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }

    assert_eq!(winners.len(), 1, "Exactly one registration should win");
    assert_eq!(conflicts, 3);

    cleanup(&store, winners[0]).await;
}
