//! Authentication error types.

use fulcrum_core::error::FulcrumError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer credentials")]
    MissingCredentials,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("invalid or expired token")]
    InvalidToken,
}

impl From<AuthError> for FulcrumError {
    fn from(err: AuthError) -> Self {
        FulcrumError::AuthenticationFailed {
            reason: err.to_string(),
        }
    }
}
