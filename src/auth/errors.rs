//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::identity::StoreError;
use crate::jwt::TokenError;

/// Why a request ended up without a principal.
///
/// Only ever logged. Clients see the generic 401 body.
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    Malformed,
    InvalidSignature,
    Expired,
    WrongKind,
    IdentityNotFound,
    IdentityDisabled,
    Storage(StoreError),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "No bearer token"),
            AuthError::Malformed => write!(f, "Malformed token"),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
            AuthError::Expired => write!(f, "Token expired"),
            AuthError::WrongKind => write!(f, "Not an access token"),
            AuthError::IdentityNotFound => write!(f, "Identity not found"),
            AuthError::IdentityDisabled => write!(f, "Identity disabled"),
            AuthError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidSignature => AuthError::InvalidSignature,
            TokenError::Expired => AuthError::Expired,
            TokenError::WrongKind => AuthError::WrongKind,
            TokenError::Malformed
            | TokenError::Encoding(_)
            | TokenError::LifetimeOverflow => AuthError::Malformed,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Storage(e)
    }
}

pub const UNAUTHORIZED_MESSAGE: &str = "Authentication failed";

/// 401 response for a protected route reached without a principal.
#[derive(Debug)]
pub struct Unauthorized {
    pub path: String,
}

impl Unauthorized {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Serialize)]
struct UnauthorizedBody {
    code: u16,
    error: &'static str,
    message: &'static str,
    path: String,
    timestamp: String,
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let body = UnauthorizedBody {
            code: StatusCode::UNAUTHORIZED.as_u16(),
            error: "UNAUTHORIZED",
            message: UNAUTHORIZED_MESSAGE,
            path: self.path,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
