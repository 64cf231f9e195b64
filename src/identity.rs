//! Lookup interface over stored user accounts.

use async_trait::async_trait;

use crate::db::IdentityRecord;
use crate::jwt::SubjectId;

/// Failure inside the backing store.
#[derive(Debug)]
pub enum StoreError {
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}

/// Read access to user accounts, keyed by id or by login email.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: SubjectId) -> Result<Option<IdentityRecord>, StoreError>;

    /// Look up an account by login email, case-insensitively.
    async fn find_by_login_key(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError>;

    async fn exists_by_login_key(&self, email: &str) -> Result<bool, StoreError>;
}
