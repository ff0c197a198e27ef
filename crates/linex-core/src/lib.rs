//! # Linex Core
//!
//! The core types of the Linex LINE bot framework.
//!
//! This crate knows how to authenticate a webhook request, turn each event
//! of its payload into a typed context, and talk back to the Messaging API.
//! It does not own handlers or a server; those live in `linex-framework`
//! and `linex-transport`.
//!
//! ## Layers
//!
//! ### Foundation
//!
//! - **Errors**: one `thiserror` enum per failure domain ([`DecodeError`],
//!   [`ApiError`], [`ContextError`], [`LookupError`])
//! - **Signatures**: HMAC-SHA256 webhook verification ([`SignatureVerifier`])
//! - **Rate limits**: per-category call budgets ([`RateLimit`], [`RateLimits`])
//!
//! ### Model
//!
//! Wire types: users, groups, sources, emojis, mentions and outbound
//! messages ([`model`]).
//!
//! ### API
//!
//! The [`ApiCaller`] seam performs raw requests; [`LineApi`] puts typed,
//! rate-limited operations on top of it.
//!
//! ### Context
//!
//! [`decode`] turns one raw event into a [`Context`], a closed enum with one
//! variant per event kind. Variants share a [`ContextBase`] with lazy,
//! memoized `author()` and `group()` lookups backed by the [`EntityCache`].
//!
//! ```text
//! ┌──────────────┐     ┌──────────┐     ┌─────────────┐
//! │ raw event    │────▶│  decode  │────▶│   Context   │──▶ handlers
//! └──────────────┘     └──────────┘     └──────┬──────┘
//!                                              │ author() / reply()
//!                                        ┌─────▼─────┐
//!                                        │  LineApi  │──▶ ApiCaller
//!                                        └───────────┘
//! ```

pub mod api;
pub mod cache;
pub mod context;
pub mod foundation;
pub mod model;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export foundation types
pub use foundation::{
    ApiError, ApiResult, CannotReplyReason, ContextError, ContextResult, DecodeError,
    DecodeResult, LookupError, LookupResult, RateLimit, RateLimits, SIGNATURE_HEADER,
    SignatureVerifier,
};

// Re-export API and cache types
pub use api::{ApiCaller, ApiRequest, ApiResponse, HttpMethod, LineApi};
pub use cache::{CacheStats, EntityCache};

// Re-export context types
pub use context::{
    Channel, Context, ContextBase, ContextDeps, EventContext, REPLY_WINDOW, Repliable, decode,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::context::event::*;
    pub use super::context::message::*;
    pub use super::context::{Channel, Context, ContextBase, EventContext, Repliable};
    pub use super::foundation::{ContextError, ContextResult};
    pub use super::model::{BotUser, Group, Message, ReplyOptions, Sender, Source, User};
}
