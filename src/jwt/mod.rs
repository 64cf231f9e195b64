//! Session token handling: claims, signing, issuance, and validation.

mod claims;
mod codec;
mod issuer;
mod validator;

pub use claims::{Claims, IdentitySnapshot, SubjectId, TokenKind};
pub use codec::{Clock, FixedClock, SystemClock, TokenCodec, TokenError};
pub use issuer::{IssuedToken, TokenIssuer, TokenPair};
pub use validator::TokenValidator;
