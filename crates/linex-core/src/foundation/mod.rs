//! Foundation layer - errors, webhook authenticity and call budgets.
//!
//! This module contains the building blocks that every other layer uses:
//! - Error types for decoding, API calls, context operations and lookups
//! - HMAC signature verification for inbound webhooks
//! - Per-category rate limit buckets for outbound calls

pub mod error;
pub mod rate_limit;
pub mod signature;

pub use error::{
    ApiError, ApiResult, CannotReplyReason, ContextError, ContextResult, DecodeError,
    DecodeResult, LookupError, LookupResult,
};
pub use rate_limit::{RateLimit, RateLimits};
pub use signature::{SIGNATURE_HEADER, SignatureVerifier, compute_signature, verify_signature};
