//! Transport error types.

use thiserror::Error;

/// Errors raised while setting up or running a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Binding or serving a socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
