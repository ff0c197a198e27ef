//! Outbound Messaging API access.
//!
//! - [`caller`]: the [`ApiCaller`] seam that performs raw HTTP requests
//! - [`line`]: [`LineApi`], typed and rate-limited operations on top of it

pub mod caller;
pub mod line;

pub use caller::{ApiCaller, ApiRequest, ApiResponse, HttpMethod};
pub use line::{DEFAULT_API_BASE, DEFAULT_DATA_BASE, LineApi};
