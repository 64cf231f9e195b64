use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt, is_unique_violation};
use crate::db::{Database, Gender, NewIdentity, RelationshipStatus};
use crate::identity::IdentityStore;
use crate::password::hash_password;
use crate::session::SessionService;

const MIN_AGE: i32 = 18;
const MAX_AGE: i32 = 35;

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub sessions: Arc<SessionService>,
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/register", post(register))
        .route("/check-email", get(check_email))
        .route("/check-username", get(check_username))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let email = payload.email.trim();

    if email.is_empty() {
        return Err(ApiError::bad_request("Email cannot be empty"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password cannot be empty"));
    }

    let session = state.sessions.login(email, &payload.password).await?;
    Ok(Json(session))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: String,
}

async fn refresh(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let token = payload.refresh_token.trim();

    if token.is_empty() {
        return Err(ApiError::bad_request("Refresh token is required"));
    }

    let session = state.sessions.refresh(token).await?;
    Ok(Json(session))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    username: String,
    age: Option<i32>,
    gender: Option<String>,
    relationship_status: Option<String>,
    avatar_url: Option<String>,
    location: Option<String>,
}

impl RegisterRequest {
    /// Validate the request and convert it into storable fields (without the hash).
    fn validate(self) -> Result<(NewIdentity, String), ApiError> {
        let email = self.email.trim().to_lowercase();
        validate_email(&email)?;
        validate_password(&self.password)?;

        let username = self.username.trim().to_string();
        validate_username(&username)?;

        let age = validate_age(self.age)?;
        let gender = parse_gender(self.gender.as_deref())?;
        let relationship_status = parse_relationship_status(self.relationship_status.as_deref())?;
        let location = normalize_location(self.location)?;

        let identity = NewIdentity {
            email,
            username,
            password_hash: String::new(),
            age,
            gender,
            relationship_status,
            avatar_url: normalize_avatar_url(self.avatar_url),
            location,
        };
        Ok((identity, self.password))
    }
}

pub(super) fn validate_age(age: Option<i32>) -> Result<i32, ApiError> {
    let age = age.ok_or_else(|| ApiError::bad_request("Age is required"))?;
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(ApiError::bad_request(format!(
            "Age must be between {} and {}",
            MIN_AGE, MAX_AGE
        )));
    }
    Ok(age)
}

pub(super) fn parse_gender(value: Option<&str>) -> Result<Gender, ApiError> {
    value
        .and_then(Gender::from_str)
        .ok_or_else(|| ApiError::bad_request("Gender must be MALE, FEMALE or OTHER"))
}

pub(super) fn parse_relationship_status(
    value: Option<&str>,
) -> Result<RelationshipStatus, ApiError> {
    value.and_then(RelationshipStatus::from_str).ok_or_else(|| {
        ApiError::bad_request("Relationship status must be SINGLE or IN_RELATIONSHIP")
    })
}

/// Blank locations are stored as absent.
pub(super) fn normalize_location(location: Option<String>) -> Result<Option<String>, ApiError> {
    let location = location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    if location.as_ref().is_some_and(|l| l.chars().count() > 100) {
        return Err(ApiError::bad_request(
            "Location cannot be longer than 100 characters",
        ));
    }
    Ok(location)
}

pub(super) fn normalize_avatar_url(avatar_url: Option<String>) -> Option<String> {
    avatar_url.filter(|u| !u.trim().is_empty())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::bad_request("Email cannot be empty"));
    }
    if email.len() > 100 {
        return Err(ApiError::bad_request(
            "Email cannot be longer than 100 characters",
        ));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(6..=50).contains(&len) {
        return Err(ApiError::bad_request(
            "Password must be between 6 and 50 characters",
        ));
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(ApiError::bad_request(
            "Password must contain an uppercase letter, a lowercase letter and a digit",
        ));
    }
    Ok(())
}

pub(super) fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(2..=50).contains(&len) {
        return Err(ApiError::bad_request(
            "Username must be between 2 and 50 characters",
        ));
    }

    // Only allow alphanumeric and underscores
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }
    Ok(())
}

async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let (mut identity, password) = payload.validate()?;

    let users = state.db.users();

    if users
        .exists_by_email(&identity.email)
        .await
        .db_err("Failed to check email availability")?
    {
        warn!("Registration rejected: email already registered");
        return Err(ApiError::conflict("Email is already registered"));
    }

    if users
        .exists_by_username(&identity.username)
        .await
        .db_err("Failed to check username availability")?
    {
        return Err(ApiError::conflict("Username is already taken"));
    }

    identity.password_hash = hash_password(&password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create account")
    })?;

    let id = match users.create(&identity).await {
        Ok(id) => id,
        // Lost a race with a concurrent registration.
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Email or username is already taken"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    let record = users
        .get_by_id(id)
        .await
        .db_err("Failed to load new user")?
        .ok_or_else(|| ApiError::internal("Failed to create account"))?;

    let session = state.sessions.establish(&record)?;
    info!(user_id = id, "User registered");
    Ok(Json(session))
}

#[derive(Deserialize)]
struct EmailQuery {
    email: String,
}

#[derive(Serialize)]
struct EmailAvailability {
    exists: bool,
    email: String,
}

async fn check_email(
    State(state): State<AuthState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let email = query.email.trim();
    if email.is_empty() {
        return Err(ApiError::bad_request("Email cannot be empty"));
    }

    let exists = state
        .db
        .exists_by_login_key(email)
        .await
        .db_err("Failed to check email")?;

    Ok(Json(EmailAvailability {
        exists,
        email: email.to_string(),
    }))
}

#[derive(Deserialize)]
struct UsernameQuery {
    username: String,
}

#[derive(Serialize)]
struct UsernameAvailability {
    exists: bool,
    username: String,
}

async fn check_username(
    State(state): State<AuthState>,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let username = query.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }

    let exists = state
        .db
        .users()
        .exists_by_username(username)
        .await
        .db_err("Failed to check username")?;

    Ok(Json(UsernameAvailability {
        exists,
        username: username.to_string(),
    }))
}

#[derive(Serialize)]
struct LogoutResponse {
    message: &'static str,
}

/// Tokens are stateless; the client discards them.
async fn logout() -> impl IntoResponse {
    Json(LogoutResponse {
        message: "Logged out successfully",
    })
}
