pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod identity;
pub mod jwt;
pub mod password;
pub mod session;

use api::create_api_router;
use auth::{IdentityResolver, IdentitySource, resolve_identity};
use axum::{Router, middleware};
use db::Database;
use jwt::{TokenCodec, TokenIssuer, TokenValidator};
use password::Argon2Verifier;
use session::SessionService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Default access token lifetime (1 day).
pub const DEFAULT_ACCESS_TOKEN_TTL: u64 = 86_400;

/// Default refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TOKEN_TTL: u64 = 604_800;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: u64,
    /// How protected requests obtain the caller's identity
    pub identity_source: IdentitySource,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let codec = Arc::new(TokenCodec::new(&config.jwt_secret));
    let issuer = TokenIssuer::new(
        codec.clone(),
        config.access_token_ttl,
        config.refresh_token_ttl,
    );
    let validator = TokenValidator::new(codec);

    let store = Arc::new(config.db.clone());
    let sessions = Arc::new(SessionService::new(
        store.clone(),
        Arc::new(Argon2Verifier),
        issuer,
        validator.clone(),
    ));
    let resolver = Arc::new(IdentityResolver::new(
        validator,
        store,
        config.identity_source,
    ));

    Router::new()
        .nest("/api", create_api_router(config.db.clone(), sessions))
        .layer(middleware::from_fn_with_state(resolver, resolve_identity))
        .layer(TraceLayer::new_for_http())
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}
