use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{
    normalize_avatar_url, normalize_location, parse_gender, parse_relationship_status,
    validate_age, validate_username,
};
use super::error::{ApiError, ResultExt, is_unique_violation};
use crate::auth::{Auth, require_principal};
use crate::db::{Database, ProfileUpdate};
use crate::session::UserInfo;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
}

/// Routes for the authenticated caller. Every route requires a principal.
pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/check-username", get(check_username))
        .route("/{user_id}", get(get_user))
        .with_state(state)
        .layer(middleware::from_fn(require_principal))
}

/// The caller as resolved by the identity middleware.
///
/// With the embedded identity source this is the token's snapshot and
/// involves no store lookup.
async fn profile(Auth(principal): Auth) -> impl IntoResponse {
    Json(UserInfo::from(&principal))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    #[serde(default)]
    username: String,
    age: Option<i32>,
    gender: Option<String>,
    relationship_status: Option<String>,
    avatar_url: Option<String>,
    location: Option<String>,
}

impl UpdateProfileRequest {
    fn validate(self) -> Result<ProfileUpdate, ApiError> {
        let username = self.username.trim().to_string();
        validate_username(&username)?;

        Ok(ProfileUpdate {
            username,
            age: validate_age(self.age)?,
            gender: parse_gender(self.gender.as_deref())?,
            relationship_status: parse_relationship_status(self.relationship_status.as_deref())?,
            avatar_url: normalize_avatar_url(self.avatar_url),
            location: normalize_location(self.location)?,
        })
    }
}

async fn update_profile(
    State(state): State<UsersState>,
    Auth(principal): Auth,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let update = payload.validate()?;
    let users = state.db.users();

    if users
        .username_taken_by_other(&update.username, principal.subject)
        .await
        .db_err("Failed to check username availability")?
    {
        return Err(ApiError::conflict("Username is already taken"));
    }

    match users.update_profile(principal.subject, &update).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::not_found("User not found")),
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Username is already taken"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update profile", e)),
    }

    let record = users
        .get_by_id(principal.subject)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = record.id, "Profile updated");
    Ok(Json(UserInfo::from(&record)))
}

#[derive(Deserialize)]
struct UsernameQuery {
    username: String,
}

#[derive(Serialize)]
struct UsernameAvailability {
    available: bool,
    username: String,
}

/// Whether the caller could switch to `username`. Their own name counts as available.
async fn check_username(
    State(state): State<UsersState>,
    Auth(principal): Auth,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let username = query.username.trim();
    validate_username(username)?;

    let taken = state
        .db
        .users()
        .username_taken_by_other(username, principal.subject)
        .await
        .db_err("Failed to check username")?;

    Ok(Json(UsernameAvailability {
        available: !taken,
        username: username.to_string(),
    }))
}

async fn get_user(
    State(state): State<UsersState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(user_id) = user_id?;

    let record = state
        .db
        .users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserInfo::from(&record)))
}
