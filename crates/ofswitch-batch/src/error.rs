//! Error types for flat batch processing

use ofswitch_session::SessionError;
use thiserror::Error;

/// Errors that reject a flat batch as a whole.
///
/// Failures of individual items are never reported here; they are
/// collected into the batch result instead.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The request was malformed; nothing was sent to the device.
    #[error("Invalid batch: {message}")]
    Validation { message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The session layer refused the request before issuing it.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether resubmitting the same batch could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Session(err) => err.is_retryable(),
            Self::Io(_) => true,
            Self::Validation { .. } | Self::Config(_) => false,
        }
    }
}

/// Result type for flat batch operations
pub type BatchRpcResult<T> = std::result::Result<T, BatchError>;
