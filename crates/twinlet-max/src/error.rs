//! Max binding error types.

use std::fmt;

/// Error type for Max host operations.
#[derive(Debug)]
pub enum MaxError {
    /// A Max API symbol could not be resolved from the running process.
    Load(String),

    /// Max refused to create or register the class.
    ClassRefused(String),
}

impl fmt::Display for MaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(msg) => write!(f, "Failed to resolve Max API: {}", msg),
            Self::ClassRefused(name) => write!(f, "Max refused to register class '{}'", name),
        }
    }
}

impl std::error::Error for MaxError {}

impl From<libloading::Error> for MaxError {
    fn from(error: libloading::Error) -> Self {
        Self::Load(error.to_string())
    }
}

/// Result type alias for Max operations.
pub type MaxResult<T> = Result<T, MaxError>;
