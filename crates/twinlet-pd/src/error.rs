//! Pd binding error types.

use std::fmt;

/// Error type for Pd host operations.
#[derive(Debug)]
pub enum PdError {
    /// A Pd API symbol could not be resolved from the running process.
    Load(String),

    /// Pd refused to create the class.
    ClassRefused(String),
}

impl fmt::Display for PdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(msg) => write!(f, "Failed to resolve Pd API: {}", msg),
            Self::ClassRefused(name) => write!(f, "Pd refused to create class '{}'", name),
        }
    }
}

impl std::error::Error for PdError {}

impl From<libloading::Error> for PdError {
    fn from(error: libloading::Error) -> Self {
        Self::Load(error.to_string())
    }
}

/// Result type alias for Pd operations.
pub type PdResult<T> = Result<T, PdError>;
