//! Runtime error types.

use linex_core::{ApiError, LookupError};
use linex_framework::{RegistrationError, WaitError};
use linex_transport::TransportError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The server or HTTP client failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A Messaging API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A command or postback route was registered twice.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A cache lookup missed.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// A `wait_for` did not resolve.
    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
