//! Error types for the Linex framework.

use linex_core::ContextError;
use thiserror::Error;

/// Errors raised while coercing command or postback arguments.
///
/// The router logs these as warnings and does not invoke the handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    /// Fewer segments than parameters.
    #[error("missing argument #{index}")]
    Missing {
        /// Zero-based parameter position.
        index: usize,
    },

    /// More segments than parameters.
    #[error("{count} unexpected trailing argument(s)")]
    Unexpected {
        /// Number of leftover segments.
        count: usize,
    },

    /// A segment could not be converted to the parameter type.
    #[error("argument #{index} ({value:?}) is not a valid {expected}")]
    Invalid {
        /// Zero-based parameter position.
        index: usize,
        /// The raw segment.
        value: String,
        /// Name of the expected type.
        expected: &'static str,
    },
}

/// Errors raised when registering handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A command with this name is already registered.
    #[error("command already exists: {0:?}")]
    DuplicateCommand(String),

    /// A postback route with this name is already registered.
    #[error("postback route already exists: {0:?}")]
    DuplicatePostback(String),

    /// A [`Rest`](crate::Rest) parameter is followed by other parameters.
    #[error("{name:?}: Rest must be the last parameter, found at #{index}")]
    MisplacedRest {
        /// The command or postback name.
        name: String,
        /// Zero-based parameter position.
        index: usize,
    },
}

/// Errors returned by `wait_for`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// No matching context arrived in time.
    #[error("timed out waiting for {channel:?}")]
    Timeout {
        /// The channel that was waited on.
        channel: String,
    },

    /// The dispatcher dropped the wait before it resolved.
    #[error("wait on {channel:?} was cancelled")]
    Closed {
        /// The channel that was waited on.
        channel: String,
    },
}

/// A failed handler invocation, as seen by the dispatcher.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("{0}")]
    Failed(String),

    /// Sending the handler's return value as a reply failed.
    #[error("failed to reply: {0}")]
    Reply(#[from] ContextError),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Creates a failure from any displayable error.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Result type for argument coercion.
pub type ArgResult<T> = Result<T, ArgError>;

/// Result type for handler registration.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Result type for `wait_for`.
pub type WaitResult<T> = Result<T, WaitError>;

/// Result of one handler invocation.
pub type HandlerResult = Result<(), HandlerError>;
