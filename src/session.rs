//! Login, refresh, and post-registration token issuance.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::auth::Principal;
use crate::db::{Gender, IdentityRecord, RelationshipStatus};
use crate::identity::{IdentityStore, StoreError};
use crate::jwt::{IdentitySnapshot, TokenError, TokenIssuer, TokenKind, TokenValidator};
use crate::password::CredentialVerifier;

pub const TOKEN_TYPE: &str = "Bearer";

/// Outward failure of a session operation.
///
/// Token and credential failures collapse into two variants so callers
/// cannot tell which check rejected them.
#[derive(Debug)]
pub enum SessionError {
    InvalidCredentials,
    InvalidRefreshToken,
    Storage(StoreError),
    Issuance(TokenError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidCredentials => write!(f, "Invalid email or password"),
            SessionError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            SessionError::Storage(e) => write!(f, "{}", e),
            SessionError::Issuance(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Storage(e)
    }
}

impl From<TokenError> for SessionError {
    fn from(e: TokenError) -> Self {
        SessionError::Issuance(e)
    }
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub age: i32,
    pub gender: Gender,
    pub relationship_status: RelationshipStatus,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

impl From<&IdentityRecord> for UserInfo {
    fn from(record: &IdentityRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            username: record.username.clone(),
            age: record.age,
            gender: record.gender,
            relationship_status: record.relationship_status,
            avatar_url: record.avatar_url.clone(),
            location: record.location.clone(),
            created_at: record.created_at.clone(),
        }
    }
}

impl From<&Principal> for UserInfo {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.subject,
            email: principal.email.clone(),
            username: principal.username.clone(),
            age: principal.age,
            gender: principal.gender,
            relationship_status: principal.relationship_status,
            avatar_url: principal.avatar_url.clone(),
            location: principal.location.clone(),
            created_at: principal.created_at.clone(),
        }
    }
}

/// Tokens handed to a client after login, refresh, or registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user: UserInfo,
}

pub struct SessionService {
    store: Arc<dyn IdentityStore>,
    verifier: Arc<dyn CredentialVerifier>,
    issuer: TokenIssuer,
    validator: TokenValidator,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        verifier: Arc<dyn CredentialVerifier>,
        issuer: TokenIssuer,
        validator: TokenValidator,
    ) -> Self {
        Self {
            store,
            verifier,
            issuer,
            validator,
        }
    }

    /// Exchange email and password for a token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let Some(record) = self.store.find_by_login_key(email).await? else {
            debug!("Login rejected: unknown email");
            return Err(SessionError::InvalidCredentials);
        };

        if !record.enabled {
            debug!(user_id = record.id, "Login rejected: account disabled");
            return Err(SessionError::InvalidCredentials);
        }

        if !self.verifier.verify(password, &record.password_hash) {
            debug!(user_id = record.id, "Login rejected: password mismatch");
            return Err(SessionError::InvalidCredentials);
        }

        let session = self.establish(&record)?;
        info!(user_id = record.id, "User logged in");
        Ok(session)
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The presented refresh token is returned unchanged; its expiry is not
    /// extended.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, SessionError> {
        let claims = match self.validator.claims_of(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(reason = %e, "Refresh rejected");
                return Err(SessionError::InvalidRefreshToken);
            }
        };
        let subject = claims.subject().ok_or(SessionError::InvalidRefreshToken)?;

        let record = match self.store.find_by_id(subject).await? {
            Some(record) if record.enabled => record,
            Some(_) => {
                debug!(user_id = subject, "Refresh rejected: account disabled");
                return Err(SessionError::InvalidRefreshToken);
            }
            None => {
                debug!(user_id = subject, "Refresh rejected: account missing");
                return Err(SessionError::InvalidRefreshToken);
            }
        };

        let now = self.issuer.codec().now();
        let access = self.issuer.issue_access_token(
            record.id,
            Some(IdentitySnapshot::from(&record)),
            now,
        )?;

        debug!(user_id = record.id, "Access token refreshed");
        Ok(Session {
            access_token: access.token,
            refresh_token: refresh_token.to_string(),
            token_type: TOKEN_TYPE,
            expires_in: self.issuer.access_ttl(),
            user: UserInfo::from(&record),
        })
    }

    /// Issue a fresh pair for an account that was just verified or created.
    pub fn establish(&self, record: &IdentityRecord) -> Result<Session, SessionError> {
        let now = self.issuer.codec().now();
        let pair =
            self.issuer
                .issue_pair(record.id, Some(IdentitySnapshot::from(record)), now)?;

        Ok(Session {
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
            token_type: TOKEN_TYPE,
            expires_in: self.issuer.access_ttl(),
            user: UserInfo::from(record),
        })
    }
}
