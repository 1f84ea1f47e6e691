//! Password Hashing
//!
//! Argon2id with a fixed cost and a fresh OS-random salt per hash.

use std::sync::LazyLock;

use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Memory cost in KiB.
const MEMORY_COST_KIB: u32 = 19_456;
const ITERATIONS: u32 = 2;
const PARALLELISM: u32 = 1;

fn hasher() -> password_hash::Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, None)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password, returning a PHC string.
pub fn hash_password(password: &str) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(hasher()?.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Verify a password against a PHC string.
///
/// `Ok(false)` on mismatch; `Err` if `hash` is not a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> password_hash::Result<bool> {
    let parsed = PasswordHash::new(hash)?;
    match hasher()?.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Hash verified against when a login names an unknown email, so both failure
/// paths pay the same Argon2 cost.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("foodlink-dummy-password").ok());

/// Burn one verification's worth of work. The result is discarded.
pub fn dummy_verify(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}
