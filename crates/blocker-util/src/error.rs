//! Error types for blockerd

use thiserror::Error;

/// Core error type for blockerd operations
#[derive(Debug, Error)]
pub enum BlockerError {
    #[error("Calendar unavailable after {attempts} attempt(s): {message}")]
    CalendarUnavailable { attempts: u32, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlockerError {
    pub fn calendar_unavailable(attempts: u32, msg: impl Into<String>) -> Self {
        Self::CalendarUnavailable {
            attempts,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error came from the calendar transport (and should be
    /// followed by the retry backoff rather than the regular poll interval)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::CalendarUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, BlockerError>;
