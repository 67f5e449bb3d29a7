//! Password hashing, access tokens, input sanitization and rate limiting

mod rate_limit;
mod token;
mod users;

pub use rate_limit::RateLimiter;
pub use token::{Claims, TokenService};
pub use users::UserStore;

use bcrypt::{hash, verify, DEFAULT_COST};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Default cap on sanitized input length (characters)
pub const MAX_INPUT_CHARS: usize = 1000;

/// Hash password using bcrypt
pub fn hash_password(password: &str) -> Result<String> {
    Ok(hash(password, DEFAULT_COST)?)
}

/// Verify password against a bcrypt hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    Ok(verify(password, password_hash)?)
}

/// Trim surrounding whitespace and cap the length at [`MAX_INPUT_CHARS`]
pub fn sanitize_input(text: &str) -> String {
    sanitize_with_limit(text, MAX_INPUT_CHARS)
}

/// Trim surrounding whitespace and keep at most `max_chars` characters
pub fn sanitize_with_limit(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

/// Build an unguessable storage name that keeps the original extension
pub fn generate_secure_filename(original_filename: &str) -> String {
    let extension = original_filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && !ext.contains(['/', '\\']));

    let nonce: [u8; 8] = rand::thread_rng().gen();
    let mut hasher = Sha256::new();
    hasher.update(original_filename.as_bytes());
    hasher.update(hex::encode(nonce).as_bytes());
    hasher.update(chrono::Utc::now().to_rfc3339().as_bytes());
    let digest = hex::encode(hasher.finalize());
    let secure_name = &digest[..16];

    match extension {
        Some(ext) => format!("{}.{}", secure_name, ext),
        None => secure_name.to_string(),
    }
}
