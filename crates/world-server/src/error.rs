use std::fmt;

/// Unified error type for the world-server crate.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// A requested document does not exist.
    NotFound(String),
    /// Invalid input provided by the caller.
    InvalidInput(String),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            CoreError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            CoreError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<area_index::IndexError> for CoreError {
    fn from(error: area_index::IndexError) -> Self {
        CoreError::Internal(format!("area index: {error}"))
    }
}

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
