//! Bearer token resolution into a request principal.

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::bearer::bearer_token;
use super::errors::{AuthError, Unauthorized};
use super::types::Principal;
use crate::identity::IdentityStore;
use crate::jwt::{TokenKind, TokenValidator};

/// Where the principal's attributes come from once a token is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IdentitySource {
    /// Look the subject up in the identity store on every request.
    #[default]
    Store,
    /// Trust the snapshot embedded in the access token.
    Embedded,
}

/// Turns the `Authorization` header of a request into a [`Principal`].
pub struct IdentityResolver {
    validator: TokenValidator,
    store: Arc<dyn IdentityStore>,
    source: IdentitySource,
}

impl IdentityResolver {
    pub fn new(
        validator: TokenValidator,
        store: Arc<dyn IdentityStore>,
        source: IdentitySource,
    ) -> Self {
        Self {
            validator,
            store,
            source,
        }
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        let claims = self.validator.claims_of(token, TokenKind::Access)?;
        let subject = claims.subject().ok_or(AuthError::Malformed)?;

        let principal = match (self.source, claims.profile) {
            (IdentitySource::Embedded, Some(snapshot)) => {
                Principal::from_snapshot(subject, &snapshot)
            }
            // Tokens without a snapshot fall back to the store.
            _ => {
                let record = self
                    .store
                    .find_by_id(subject)
                    .await?
                    .ok_or(AuthError::IdentityNotFound)?;
                Principal::from_record(&record)
            }
        };

        if !principal.enabled {
            return Err(AuthError::IdentityDisabled);
        }
        Ok(principal)
    }
}

/// Middleware that publishes the caller's [`Principal`] into the request
/// extensions when a valid access token is presented.
///
/// Never rejects: failures leave the request unauthenticated.
pub async fn resolve_identity(
    State(resolver): State<Arc<IdentityResolver>>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolver.resolve(request.headers()).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
        }
        Err(AuthError::MissingToken) => {}
        Err(AuthError::Storage(e)) => {
            warn!(error = %e, "Identity lookup failed");
        }
        Err(e) => {
            debug!(reason = %e, "Bearer token not accepted");
        }
    }
    next.run(request).await
}

/// Access-control middleware for protected routes.
pub async fn require_principal(request: Request, next: Next) -> Response {
    if request.extensions().get::<Principal>().is_some() {
        return next.run(request).await;
    }
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    Unauthorized::new(path).into_response()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::http::{HeaderValue, header};

    use super::*;
    use crate::db::{Gender, IdentityRecord, RelationshipStatus};
    use crate::identity::StoreError;
    use crate::jwt::{FixedClock, IdentitySnapshot, TokenCodec, TokenIssuer};

    const NOW: u64 = 1_700_000_000;

    #[derive(Default)]
    struct MemoryStore {
        users: Mutex<HashMap<i64, IdentityRecord>>,
    }

    impl MemoryStore {
        fn insert(&self, record: IdentityRecord) {
            self.users.lock().unwrap().insert(record.id, record);
        }

        fn disable(&self, id: i64) {
            if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
                user.enabled = false;
            }
        }
    }

    #[async_trait]
    impl IdentityStore for MemoryStore {
        async fn find_by_id(&self, id: i64) -> Result<Option<IdentityRecord>, StoreError> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_login_key(
            &self,
            email: &str,
        ) -> Result<Option<IdentityRecord>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn exists_by_login_key(&self, email: &str) -> Result<bool, StoreError> {
            Ok(self.find_by_login_key(email).await?.is_some())
        }
    }

    fn record(id: i64, username: &str) -> IdentityRecord {
        IdentityRecord {
            id,
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: String::new(),
            age: 30,
            gender: Gender::Other,
            relationship_status: RelationshipStatus::Single,
            avatar_url: None,
            location: None,
            enabled: true,
            created_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    struct Fixture {
        issuer: TokenIssuer,
        store: Arc<MemoryStore>,
        resolver: IdentityResolver,
    }

    fn fixture(source: IdentitySource) -> Fixture {
        let codec = Arc::new(TokenCodec::with_clock(
            b"resolver-test-secret",
            Arc::new(FixedClock(NOW)),
        ));
        let store = Arc::new(MemoryStore::default());
        store.insert(record(1, "alice"));
        Fixture {
            issuer: TokenIssuer::new(codec.clone(), 60, 600),
            store: store.clone(),
            resolver: IdentityResolver::new(TokenValidator::new(codec), store, source),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_store_lookup_resolves_principal() {
        let f = fixture(IdentitySource::Store);
        let token = f.issuer.issue_access_token(1, None, NOW).unwrap().token;

        let principal = f.resolver.resolve(&bearer(&token)).await.unwrap();
        assert_eq!(principal.subject, 1);
        assert_eq!(principal.username, "alice");
        assert_eq!(principal.email, "alice@example.com");
        assert!(principal.enabled);
    }

    #[tokio::test]
    async fn test_missing_header() {
        let f = fixture(IdentitySource::Store);
        assert!(matches!(
            f.resolver.resolve(&HeaderMap::new()).await,
            Err(AuthError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_a_bearer() {
        let f = fixture(IdentitySource::Store);
        let token = f.issuer.issue_refresh_token(1, NOW).unwrap().token;

        assert!(matches!(
            f.resolver.resolve(&bearer(&token)).await,
            Err(AuthError::WrongKind)
        ));
    }

    #[tokio::test]
    async fn test_unknown_subject() {
        let f = fixture(IdentitySource::Store);
        let token = f.issuer.issue_access_token(99, None, NOW).unwrap().token;

        assert!(matches!(
            f.resolver.resolve(&bearer(&token)).await,
            Err(AuthError::IdentityNotFound)
        ));
    }

    #[tokio::test]
    async fn test_store_lookup_sees_disable_immediately() {
        let f = fixture(IdentitySource::Store);
        let snapshot = IdentitySnapshot::from(&record(1, "alice"));
        let token = f
            .issuer
            .issue_access_token(1, Some(snapshot), NOW)
            .unwrap()
            .token;

        f.store.disable(1);
        assert!(matches!(
            f.resolver.resolve(&bearer(&token)).await,
            Err(AuthError::IdentityDisabled)
        ));
    }

    #[tokio::test]
    async fn test_embedded_snapshot_skips_store() {
        let f = fixture(IdentitySource::Embedded);
        // Subject 7 is not in the store; the snapshot alone is trusted.
        let snapshot = IdentitySnapshot::from(&record(7, "zoe"));
        let token = f
            .issuer
            .issue_access_token(7, Some(snapshot), NOW)
            .unwrap()
            .token;

        let principal = f.resolver.resolve(&bearer(&token)).await.unwrap();
        assert_eq!(principal.subject, 7);
        assert_eq!(principal.username, "zoe");
    }

    #[tokio::test]
    async fn test_embedded_disabled_snapshot() {
        let f = fixture(IdentitySource::Embedded);
        let mut snapshot = IdentitySnapshot::from(&record(1, "alice"));
        snapshot.enabled = false;
        let token = f
            .issuer
            .issue_access_token(1, Some(snapshot), NOW)
            .unwrap()
            .token;

        assert!(matches!(
            f.resolver.resolve(&bearer(&token)).await,
            Err(AuthError::IdentityDisabled)
        ));
    }

    #[tokio::test]
    async fn test_embedded_without_snapshot_falls_back_to_store() {
        let f = fixture(IdentitySource::Embedded);
        let token = f.issuer.issue_access_token(1, None, NOW).unwrap().token;

        let principal = f.resolver.resolve(&bearer(&token)).await.unwrap();
        assert_eq!(principal.username, "alice");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let f = fixture(IdentitySource::Store);
        let token = f
            .issuer
            .issue_access_token(1, None, NOW - 120)
            .unwrap()
            .token;

        assert!(matches!(
            f.resolver.resolve(&bearer(&token)).await,
            Err(AuthError::Expired)
        ));
    }

    mod middleware {
        use axum::{Extension, Router, body::Body, http::StatusCode, routing::get};
        use tower::ServiceExt;

        use super::*;

        fn app(resolver: IdentityResolver) -> Router {
            let protected = Router::new()
                .route(
                    "/me",
                    get(|Extension(p): Extension<Principal>| async move { p.username }),
                )
                .layer(axum::middleware::from_fn(require_principal));

            Router::new()
                .route(
                    "/open",
                    get(|request: Request| async move {
                        match request.extensions().get::<Principal>() {
                            Some(p) => p.username.clone(),
                            None => "anonymous".to_string(),
                        }
                    }),
                )
                .nest("/private", protected)
                .layer(axum::middleware::from_fn_with_state(
                    Arc::new(resolver),
                    resolve_identity,
                ))
        }

        fn get_with(uri: &str, token: Option<&str>) -> Request {
            let mut builder = Request::builder().uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            builder.body(Body::empty()).unwrap()
        }

        async fn body_string(response: Response) -> String {
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            String::from_utf8(bytes.to_vec()).unwrap()
        }

        #[tokio::test]
        async fn test_open_route_continues_without_principal() {
            let f = fixture(IdentitySource::Store);
            let response = app(f.resolver)
                .oneshot(get_with("/open", Some("garbage")))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "anonymous");
        }

        #[tokio::test]
        async fn test_protected_route_with_access_token() {
            let f = fixture(IdentitySource::Store);
            let token = f.issuer.issue_access_token(1, None, NOW).unwrap().token;

            let response = app(f.resolver)
                .oneshot(get_with("/private/me", Some(&token)))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "alice");
        }

        #[tokio::test]
        async fn test_protected_route_rejects_with_original_path() {
            let f = fixture(IdentitySource::Store);
            let token = f.issuer.issue_refresh_token(1, NOW).unwrap().token;

            let response = app(f.resolver)
                .oneshot(get_with("/private/me", Some(&token)))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let json: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(json["path"], "/private/me");
            assert_eq!(json["message"], "Authentication failed");
        }
    }
}
