//! Error handling for the agentry library
//!
//! This module provides the unified error taxonomy for the dispatch core. Every
//! failure a caller can observe maps to exactly one of these categories, so the
//! HTTP layer (and any other embedding) can frame failures without inspecting
//! message text:
//!
//! - **Validation** - malformed registration input or a parameter mismatch at
//!   dispatch time; always client-caused and detected locally
//! - **Not Found** - the requested tool is not registered
//! - **Authorization** - the calling agent is unknown or not active
//! - **Timeout** - a handler exceeded its declared execution budget
//! - **Handler** - a tool handler returned an error; caught at the dispatch
//!   boundary and never allowed to crash the dispatcher
//! - **Configuration / Serialization** - setup and encoding failures outside
//!   the dispatch path
//!
//! # Quick Start
//!
//! Classify errors for appropriate handling:
//! ```rust
//! use agentry::error::AgentryError;
//!
//! # fn handle_error(error: AgentryError) {
//! match error {
//!     _ if error.is_user_error() => {
//!         eprintln!("Fix the request: {}", error);
//!     }
//!     _ if error.is_auth_error() => {
//!         eprintln!("Register the agent first: {}", error);
//!     }
//!     _ => {
//!         eprintln!("Execution failed: {}", error);
//!     }
//! }
//! # }
//! ```
//!
//! The core never retries on its own; retry policy belongs to the caller.
//! [`AgentryError::http_status`] gives the canonical status code for each
//! category (400 / 403 / 404 / 500).

use thiserror::Error;

/// Main error type for the agentry library
#[derive(Error, Debug, Clone)]
pub enum AgentryError {
    /// Registration input or dispatch parameters are invalid
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    /// The requested tool is not registered
    #[error("Not found: {message}")]
    NotFoundError { message: String },

    /// The calling agent is unknown or not active
    #[error("Authorization error: {message}")]
    AuthorizationError { message: String },

    /// A handler exceeded its declared timeout budget
    #[error("Tool execution timed out after {timeout_secs} seconds")]
    TimeoutError { timeout_secs: u64 },

    /// A tool handler failed; caught at the dispatch boundary
    #[error("Tool execution failed: {message}")]
    HandlerError { message: String },

    /// Configuration errors (setup, credentials, etc.)
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl AgentryError {
    /// Create a ValidationError
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Create a NotFoundError
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFoundError {
            message: message.into(),
        }
    }

    /// Create an AuthorizationError
    pub fn authorization_error(message: impl Into<String>) -> Self {
        Self::AuthorizationError {
            message: message.into(),
        }
    }

    /// Create a TimeoutError
    pub fn timeout_error(timeout_secs: u64) -> Self {
        Self::TimeoutError { timeout_secs }
    }

    /// Create a HandlerError
    pub fn handler_error(message: impl Into<String>) -> Self {
        Self::HandlerError {
            message: message.into(),
        }
    }

    /// Create a ConfigurationError
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Check if this error is due to user input
    pub fn is_user_error(&self) -> bool {
        matches!(self, AgentryError::ValidationError { .. })
    }

    /// Check if this error is due to agent identity/permissions
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AgentryError::AuthorizationError { .. })
    }

    /// Check if this error happened while a handler was running
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self,
            AgentryError::TimeoutError { .. } | AgentryError::HandlerError { .. }
        )
    }

    /// Check if a caller-owned retry could plausibly succeed.
    ///
    /// The core never retries; this only informs callers. Timeouts are the
    /// one category where a later attempt may behave differently.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentryError::TimeoutError { .. })
    }

    /// The canonical HTTP status code for this error category
    pub fn http_status(&self) -> u16 {
        match self {
            AgentryError::ValidationError { .. } => 400,
            AgentryError::AuthorizationError { .. } => 403,
            AgentryError::NotFoundError { .. } => 404,
            AgentryError::TimeoutError { .. }
            | AgentryError::HandlerError { .. }
            | AgentryError::ConfigurationError { .. }
            | AgentryError::SerializationError { .. } => 500,
        }
    }
}

/// Map JSON serialization errors to AgentryError
impl From<serde_json::Error> for AgentryError {
    fn from(error: serde_json::Error) -> Self {
        AgentryError::serialization_error(format!("JSON serialization failed: {}", error))
    }
}
