use std::sync::Arc;

use super::claims::{Claims, IdentitySnapshot, SubjectId, TokenKind};
use super::codec::{TokenCodec, TokenError};

/// A signed token together with the times it was stamped with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub kind: TokenKind,
    pub issued_at: u64,
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Produces access and refresh tokens with fixed lifetimes.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    access_ttl: u64,
    refresh_ttl: u64,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, access_ttl: u64, refresh_ttl: u64) -> Self {
        Self {
            codec,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl(&self) -> u64 {
        self.access_ttl
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn issue_access_token(
        &self,
        subject: SubjectId,
        snapshot: Option<IdentitySnapshot>,
        now: u64,
    ) -> Result<IssuedToken, TokenError> {
        let exp = expiry(now, self.access_ttl)?;
        self.sign(Claims::new(subject, TokenKind::Access, now, exp).with_profile(snapshot))
    }

    /// Refresh tokens never carry a snapshot.
    pub fn issue_refresh_token(
        &self,
        subject: SubjectId,
        now: u64,
    ) -> Result<IssuedToken, TokenError> {
        let exp = expiry(now, self.refresh_ttl)?;
        self.sign(Claims::new(subject, TokenKind::Refresh, now, exp))
    }

    /// Issue both tokens stamped with the same `now`.
    pub fn issue_pair(
        &self,
        subject: SubjectId,
        snapshot: Option<IdentitySnapshot>,
        now: u64,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue_access_token(subject, snapshot, now)?,
            refresh: self.issue_refresh_token(subject, now)?,
        })
    }

    fn sign(&self, claims: Claims) -> Result<IssuedToken, TokenError> {
        let token = self.codec.encode(&claims)?;
        Ok(IssuedToken {
            token,
            kind: claims.kind,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

fn expiry(now: u64, ttl: u64) -> Result<u64, TokenError> {
    now.checked_add(ttl).ok_or(TokenError::LifetimeOverflow)
}
