//! HS256 encoding and verification of session tokens.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::Claims;

/// Source of the current Unix time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

/// Errors produced while encoding or decoding a token.
#[derive(Debug)]
pub enum TokenError {
    /// Serializing the claims failed
    Encoding(jsonwebtoken::errors::Error),
    /// Token structure, header, or claims could not be parsed
    Malformed,
    /// MAC does not match (tampered, or signed with another key)
    InvalidSignature,
    /// Current time is past the `exp` claim
    Expired,
    /// Token kind differs from what the caller expects
    WrongKind,
    /// `iat + lifetime` does not fit in a Unix timestamp
    LifetimeOverflow,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::WrongKind => write!(f, "Wrong token type"),
            TokenError::LifetimeOverflow => write!(f, "Token lifetime overflows expiry time"),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs and verifies tokens with the process signing key.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec for the given secret, using the wall clock.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock in `decode`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    /// Current Unix time according to this codec's clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Sign a claim set into a compact `header.payload.signature` string.
    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Verify the signature, then the structure, then expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        if claims.exp <= claims.iat || claims.subject().is_none() {
            return Err(TokenError::Malformed);
        }

        if self.now() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
