//! Credential helpers
//!
//! - Staff password hashing and verification
//! - Session token generation

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::{
    digest,
    rand::{SecureRandom, SystemRandom},
};

use crate::error::{AppError, Result};

const SESSION_TOKEN_LENGTH: usize = 32;

/// Hash a password or token for storage (SHA-256, hex).
pub fn hash_secret(secret: &str) -> String {
    let hash = digest::digest(&digest::SHA256, secret.as_bytes());
    hex::encode(hash.as_ref())
}

/// Verify a secret against a stored hash.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    let computed_hash = hash_secret(secret);
    // Constant-time comparison using constant length comparison
    if computed_hash.len() != hash.len() {
        return false;
    }
    computed_hash
        .as_bytes()
        .iter()
        .zip(hash.as_bytes().iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Generate a session token (base64url, 32 bytes)
pub fn generate_session_token() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; SESSION_TOKEN_LENGTH];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system randomness unavailable")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
