use thiserror::Error;

/// Failures a caller cannot recover from by inspecting a response.
///
/// Client mistakes and unsupported operations are not errors: they come back
/// as responses carrying a status code.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request cancelled")]
    Cancelled,

    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("a storage root is already mounted at prefix '{0}'")]
    DuplicatePrefix(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
