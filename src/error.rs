use thiserror::Error;

use crate::api::ApiError;

/// Input rejected locally, before anything reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Username must be between {min} and {max} characters", min = USERNAME_LEN.0, max = USERNAME_LEN.1)]
    Username,

    #[error("Password must be between {min} and {max} characters", min = PASSWORD_LEN.0, max = PASSWORD_LEN.1)]
    Password,

    #[error("Please upload a valid PDF file")]
    NotPdf,
}

pub const USERNAME_LEN: (usize, usize) = (3, 30);
pub const PASSWORD_LEN: (usize, usize) = (6, 100);

/// Login/register failure. The session is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0}")]
    InvalidTokens(&'static str),
}
