//! Linex Runtime - the client surface of the Linex LINE bot framework.
//!
//! This crate provides:
//! - Layered configuration (`linex.toml`, profiles, `LINEX_*` variables)
//! - Logging setup over `tracing-subscriber`
//! - [`LinexRuntime`], which wires the API client, dispatcher and webhook
//!   server together
//!
//! ```ignore
//! use std::sync::Arc;
//! use linex_runtime::LinexRuntime;
//! use linex_core::context::TextMessageContext;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = LinexRuntime::new()?;
//!
//!     runtime.on::<TextMessageContext, _, _>(|ctx: Arc<TextMessageContext>| async move {
//!         ctx.text().to_string()
//!     });
//!
//!     // Serves until Ctrl+C or SIGTERM
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [channel]
//! secret = "..."
//! access_token = "..."
//!
//! [server]
//! port = 8080
//! path = "/callback"
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! `LINEX_CHANNEL_SECRET`, `LINEX_CHANNEL_ACCESS_TOKEN` and nested
//! `LINEX_SERVER__PORT`-style variables override the files.

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, LinexConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{LinexRuntime, RuntimeBuilder, Webhook, wait_for_shutdown};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
///
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
