//! Password hashing and verification using bcrypt
//!
//! Hashes are produced at a fixed cost factor of 12. The encoded hash
//! carries its own salt and cost, so verification needs nothing else.

use thiserror::Error;

/// Cost factor used for every stored password hash
pub const BCRYPT_COST: u32 = 12;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Password hashing configuration
#[derive(Debug, Clone, Copy)]
pub struct PasswordConfig {
    /// bcrypt cost factor (4..=31)
    pub cost: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self { cost: BCRYPT_COST }
    }
}

impl PasswordConfig {
    /// Cheapest cost bcrypt accepts; only for tests
    pub fn fast_for_tests() -> Self {
        Self {
            cost: 4,
        }
    }
}

/// Hash a plaintext password at the fixed production cost
///
/// # Example
///
/// ```no_run
/// use filmfolk_api::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("password123").expect("hashing failed");
/// assert!(verify_password("password123", &hash).unwrap());
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_config(password, &PasswordConfig::default())
}

/// Hash a password with a custom cost
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    bcrypt::hash(password, config.cost).map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Verify a plaintext password against a stored hash
///
/// # Returns
///
/// * `Ok(true)` - Password matches
/// * `Ok(false)` - Password does not match
/// * `Err(PasswordError::InvalidHashFormat)` - Stored hash is not a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    bcrypt::verify(password, hash).map_err(|_| PasswordError::InvalidHashFormat)
}
