//! Stateless bearer-token authentication.
//!
//! Every request passes through [`resolve_identity`], which publishes a
//! [`Principal`] into the request extensions when a valid access token is
//! presented. Protected routes are wrapped in [`require_principal`] or use
//! the [`Auth`] extractor; both answer with the same 401 body.

mod bearer;
mod errors;
mod extractors;
mod resolver;
mod types;

pub use bearer::{BEARER_PREFIX, bearer_token};
pub use errors::{AuthError, UNAUTHORIZED_MESSAGE, Unauthorized};
pub use extractors::Auth;
pub use resolver::{IdentityResolver, IdentitySource, require_principal, resolve_identity};
pub use types::Principal;
