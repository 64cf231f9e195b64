mod auth;
mod error;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::session::SessionService;

pub use auth::AuthState;
pub use error::{ApiError, ResultExt};
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(db: Database, sessions: Arc<SessionService>) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        sessions,
    };

    let users_state = users::UsersState { db };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/user", users::router(users_state))
}
