// SPDX-License-Identifier: MPL-2.0

//! Error types for camera session configuration
//!
//! A write whose predicate rejects the new value is *not* an error; it is
//! reported as [`WriteOutcome::Unchanged`].

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;

/// Main session error type
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Requested value is not supported by the hardware
    UnsupportedValue(String),
    /// A native camera call failed
    PlatformCallFailure(BackendError),
    /// Write after dispose, invalid phase transition, or an action outside
    /// its required capture mode
    LifecycleViolation(String),
    /// Configuration errors
    Config(String),
}

impl SessionError {
    /// Check if the error came from the platform layer
    pub fn is_platform(&self) -> bool {
        matches!(self, SessionError::PlatformCallFailure(_))
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(self, SessionError::LifecycleViolation(_))
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnsupportedValue(msg) => write!(f, "Unsupported value: {}", msg),
            SessionError::PlatformCallFailure(e) => write!(f, "Platform call failed: {}", e),
            SessionError::LifecycleViolation(msg) => write!(f, "Lifecycle violation: {}", msg),
            SessionError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::PlatformCallFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        SessionError::PlatformCallFailure(err)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Config(err.to_string())
    }
}

/// Result of a write that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The new value was committed and observers were notified
    Applied,
    /// The predicate rejected the value; nothing ran
    Unchanged,
    /// The session is not running; the write was buffered for later replay
    Deferred,
}
