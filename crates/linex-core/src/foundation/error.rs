//! Unified error types for the Linex core crate.
//!
//! Each failure domain gets its own enum so callers can match on exactly the
//! cases they care about. Framework-level errors (argument coercion, waits)
//! live in `linex-framework`.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors produced while decoding one webhook event into a context.
///
/// Both variants are local to a single event: the dispatcher logs them and
/// moves on to the next event in the batch.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The event discriminator matched none of the known kinds.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A required field was missing or had the wrong shape.
    #[error("malformed event: {reason}")]
    MalformedEvent {
        /// Reason for failure.
        reason: String,
    },
}

impl DecodeError {
    /// Creates a malformed event error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors from outbound calls to the platform API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The platform answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        message: String,
    },

    /// The requested resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested resource existed but has expired (HTTP 410).
    #[error("gone: {0}")]
    Gone(String),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

// =============================================================================
// Context Errors
// =============================================================================

/// Why a reply attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannotReplyReason {
    /// The event carried no reply token.
    MissingToken,
    /// More than twenty minutes passed since the event timestamp.
    Expired,
    /// The context has already been replied to.
    AlreadyReplied,
}

impl fmt::Display for CannotReplyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::MissingToken => "no reply token",
            Self::Expired => "reply token expired",
            Self::AlreadyReplied => "already replied",
        };
        f.write_str(reason)
    }
}

/// Errors raised by context operations inside handlers.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// Group enrichment was requested on a context that is not from a group.
    #[error("context does not originate from a group")]
    NotGroupContext,

    /// The event source carries no user id.
    #[error("event source has no user id")]
    MissingAuthor,

    /// The reply was refused before any request was made.
    #[error("cannot reply: {0}")]
    CannotReply(CannotReplyReason),

    /// The underlying API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Writing downloaded content failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ContextError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Lookup Errors
// =============================================================================

/// Cache lookup failures.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// Nothing with this id has been seen by this client.
    #[error("unknown {kind}: {id}")]
    Unknown {
        /// Entity kind ("user", "group", "message").
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },
}

impl LookupError {
    /// Creates an unknown-entity error.
    pub fn unknown(kind: &'static str, id: impl Into<String>) -> Self {
        Self::Unknown {
            kind,
            id: id.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for context operations.
pub type ContextResult<T> = Result<T, ContextError>;

/// Result type for cache lookups.
pub type LookupResult<T> = Result<T, LookupError>;
