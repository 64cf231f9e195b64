//! Password hashing and verification with Argon2id.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Checks a submitted password against a stored hash.
pub trait CredentialVerifier: Send + Sync {
    /// Returns false on mismatch and on unparseable hashes.
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn verify(&self, plain: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is not in PHC format");
                return false;
            }
        };

        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Hash a password with a fresh random salt, returning a PHC string.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}
