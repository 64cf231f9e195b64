//! Authorization header parsing.

use axum::http::{HeaderMap, header};

pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() { None } else { Some(token) }
}
