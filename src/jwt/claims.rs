//! Claim set carried inside every session token.

use serde::{Deserialize, Serialize};

use crate::db::{Gender, IdentityRecord, RelationshipStatus};

/// Identifier of the user a token was issued to.
pub type SubjectId = i64;

/// Token kind, stored in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived bearer credential accepted on protected routes.
    Access,
    /// Long-lived credential accepted only by the refresh endpoint.
    Refresh,
}

/// Identity attributes embedded in access tokens at issuance time.
///
/// These can go stale until the next access token is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    pub username: String,
    pub email: String,
    pub enabled: bool,
    pub age: i32,
    pub gender: Gender,
    pub relationship_status: RelationshipStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub created_at: String,
}

impl From<&IdentityRecord> for IdentitySnapshot {
    fn from(record: &IdentityRecord) -> Self {
        Self {
            username: record.username.clone(),
            email: record.email.clone(),
            enabled: record.enabled,
            age: record.age,
            gender: record.gender,
            relationship_status: record.relationship_status,
            avatar_url: record.avatar_url.clone(),
            location: record.location.clone(),
            created_at: record.created_at.clone(),
        }
    }
}

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (decimal user id)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Token kind
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Identity snapshot, access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<IdentitySnapshot>,
}

impl Claims {
    pub fn new(subject: SubjectId, kind: TokenKind, iat: u64, exp: u64) -> Self {
        Self {
            sub: subject.to_string(),
            iat,
            exp,
            kind,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: Option<IdentitySnapshot>) -> Self {
        self.profile = profile;
        self
    }

    /// Parse the `sub` claim back into a user id.
    pub fn subject(&self) -> Option<SubjectId> {
        self.sub.parse().ok()
    }
}
