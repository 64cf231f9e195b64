//! Axum extractors for the request principal.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};

use super::errors::Unauthorized;
use super::types::Principal;

/// Extractor for handlers that require an authenticated caller.
/// Rejects with the standard 401 body when no principal was resolved.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(principal) => Ok(Auth(principal.clone())),
            None => {
                let path = parts
                    .extensions
                    .get::<OriginalUri>()
                    .map(|uri| uri.path().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string());
                Err(Unauthorized::new(path))
            }
        }
    }
}
