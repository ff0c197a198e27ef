//! # Linex
//!
//! A webhook-driven framework for LINE Messaging API bots.
//!
//! ## Overview
//!
//! The LINE platform delivers signed batches of events to your webhook.
//! Linex verifies each batch, decodes every event into a typed context and
//! runs the handlers registered for its channel, in order. Contexts carry
//! everything needed to answer: the reply token, lazy author and group
//! lookups, and the rate-limited API client.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌────────────┐     ┌──────────────────┐
//! │ LINE (POST)  │────▶│ Webhook    │────▶│ Dispatcher │────▶│ handlers "text"  │──▶ reply()
//! │              │     │ server     │     │ (decode)   │────▶│ handlers "follow"│──▶ push()
//! └──────────────┘     └────────────┘     └─────┬──────┘     └──────────────────┘
//!                                               │ wait_for
//!                                               ▼
//!                                        pending waiters
//! ```
//!
//! - **Runtime**: configuration, logging, server lifecycle
//! - **Dispatcher**: decodes events and routes them by channel
//! - **Handlers**: async functions with context extractors (Axum-style)
//! - **Routers**: text commands and postback routes with typed arguments
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linex::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = LinexRuntime::new()?;
//!
//!     runtime.command("/add", |_: Arc<TextMessageContext>, a: i64, b: i64| async move {
//!         (a + b).to_string()
//!     })?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: `linex.toml` configuration files (default)
//! - `yaml-config`: `linex.yaml` configuration files
//! - `json-log`: JSON log lines
//! - `testing`: `MockApiCaller` for handler tests

pub use linex_core as core;
pub use linex_framework as framework;
pub use linex_runtime as runtime;
pub use linex_transport as transport;

pub use linex_runtime::{LinexConfig, LinexRuntime, RuntimeError, RuntimeResult};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use linex::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use linex_runtime::{LinexConfig, LinexRuntime};

    // Contexts, models and reply errors
    pub use linex_core::prelude::*;

    // Handlers and routers
    pub use linex_framework::{
        FromContext, HandlerError, HandlerId, HandlerResult, Rest, postback_data,
    };
}
