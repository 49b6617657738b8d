use thiserror::Error;

use crate::remote::RemoteError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a hub operation, as surfaced to the user.
#[derive(Error, Debug)]
pub enum Error {
    /// A required field was blank. Never reaches the network.
    #[error("Validation error: {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The credential was missing or rejected. The session is logged out.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Network, status or decode failure. Not retried.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    pub fn blank(field: &'static str) -> Self {
        Self::Validation {
            field,
            message: "must not be blank".to_string(),
        }
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Authorization(_))
    }
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthorized => Self::Authorization("credential rejected".to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}
