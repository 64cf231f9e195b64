use std::sync::Arc;

use super::claims::{Claims, SubjectId, TokenKind};
use super::codec::{TokenCodec, TokenError};

/// Read-only view over presented tokens.
///
/// None of these methods fail loudly: callers that only care whether a token
/// is usable get a `bool` or an `Option`.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    codec: Arc<TokenCodec>,
}

impl TokenValidator {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// True when the token decodes with a valid signature and is not expired.
    pub fn validate(&self, token: &str) -> bool {
        match self.codec.decode(token) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(reason = %e, "Token rejected");
                false
            }
        }
    }

    /// Kind of a valid token, `None` when the token cannot be decoded.
    pub fn kind_of(&self, token: &str) -> Option<TokenKind> {
        self.codec.decode(token).ok().map(|c| c.kind)
    }

    pub fn subject_of(&self, token: &str) -> Result<SubjectId, TokenError> {
        self.codec
            .decode(token)?
            .subject()
            .ok_or(TokenError::Malformed)
    }

    /// Decode and require a specific token kind.
    pub fn claims_of(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.codec.decode(token)?;
        if claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }
}
