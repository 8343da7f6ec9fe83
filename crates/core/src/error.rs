//! Error types for private relational synthesis.

/// Errors that can occur while deriving privacy parameters or running synthesis.
#[derive(Debug, thiserror::Error)]
pub enum DpError {
    /// Invalid parameter provided.
    #[error("invalid parameter: {msg}")]
    InvalidParameters {
        /// Human-readable error description.
        msg: String,
    },

    /// A run precondition does not hold (mode flags, relationship capacity, ...).
    #[error("precondition violated: {msg}")]
    Precondition {
        /// Human-readable error description.
        msg: String,
    },

    /// Numerical computation error.
    #[error("numerical error: {msg}")]
    NumericalError {
        /// Human-readable error description.
        msg: String,
    },

    /// Configuration error.
    #[error("configuration error: {msg}")]
    ConfigError {
        /// Human-readable error description.
        msg: String,
    },

    /// Mismatched vector or matrix dimensions.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },
}

/// Result type for DP operations.
pub type Result<T> = std::result::Result<T, DpError>;

impl DpError {
    /// Create an invalid parameter error.
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameters { msg: msg.into() }
    }

    /// Create a precondition error.
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        Self::Precondition { msg: msg.into() }
    }

    /// Create a numerical error.
    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        Self::NumericalError { msg: msg.into() }
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError { msg: msg.into() }
    }

    /// Create a shape mismatch error.
    pub fn shape(expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { expected, actual }
    }
}
