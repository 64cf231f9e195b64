//! Per-request identity.

use crate::db::{Gender, IdentityRecord, RelationshipStatus};
use crate::jwt::{IdentitySnapshot, SubjectId};

/// The authenticated caller of the current request.
///
/// Built once per request by the identity middleware and stored in the
/// request extensions. Never persisted. With the embedded identity source
/// the attributes are those stamped into the access token, so they can lag
/// behind the store until the token is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: SubjectId,
    pub username: String,
    pub email: String,
    pub enabled: bool,
    pub age: i32,
    pub gender: Gender,
    pub relationship_status: RelationshipStatus,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

impl Principal {
    pub fn from_record(record: &IdentityRecord) -> Self {
        Self {
            subject: record.id,
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

    pub fn from_snapshot(subject: SubjectId, snapshot: &IdentitySnapshot) -> Self {
        Self {
            subject,
            username: snapshot.username.clone(),
            email: snapshot.email.clone(),
            enabled: snapshot.enabled,
            age: snapshot.age,
            gender: snapshot.gender,
            relationship_status: snapshot.relationship_status,
            avatar_url: snapshot.avatar_url.clone(),
            location: snapshot.location.clone(),
            created_at: snapshot.created_at.clone(),
        }
    }
}
