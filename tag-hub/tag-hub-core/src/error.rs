//! Error kinds surfaced by the hub.

/// Errors returned by hub operations.
///
/// `NotFound` covers both genuinely missing objects and objects the caller
/// is not allowed to see; callers cannot tell the two apart.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("permission denied")]
    PermissionDenied,
    #[error("not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether the error is caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::PermissionDenied | Error::NotFound | Error::Validation(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
