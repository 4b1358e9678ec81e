//! Password hashing and secret comparison helpers.
//!
//! Hashes are argon2 PHC strings. Every comparison of caller-supplied secrets
//! (passwords, webhook keys) runs in constant time.

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use password_hash::{PasswordHash, SaltString};
use subtle::ConstantTimeEq;

/// Minimum accepted password length for new or reset passwords.
pub const MIN_PASSWORD_LEN: usize = 8;

// Verified against when the username does not exist, so a miss costs the
// same as a wrong password.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| {
    hash_password("matchdesk-dummy-credential").unwrap_or_default()
});

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

/// Verify `password` against a PHC string. Unparseable hashes never verify.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Burn one verification against the dummy hash and report failure.
pub fn verify_against_dummy(password: &str) -> bool {
    let _ = verify_password(&DUMMY_HASH, password);
    false
}

/// Constant-time equality for shared secrets such as webhook API keys.
pub fn secrets_equal(provided: &str, expected: &str) -> bool {
    bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

pub fn validate_new_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(anyhow!("password must be at least {} characters", MIN_PASSWORD_LEN));
    }
    Ok(())
}
