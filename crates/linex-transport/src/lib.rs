//! # Linex Transport
//!
//! Network transport for the Linex LINE bot framework.
//!
//! ## Features
//!
//! - `http-server`: the axum webhook server
//! - `http-client`: the reqwest-backed [`ApiCaller`](linex_core::ApiCaller)
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//!   LINE platform
//!        │ POST (signed)              ▲ HTTPS + bearer token
//! ┌──────▼────────────┐        ┌──────┴────────────┐
//! │  WebhookServer    │        │  HttpApiCaller    │  <- This crate
//! ├───────────────────┤        ├───────────────────┤
//! │  Dispatcher       │        │  LineApi          │  (framework / core)
//! └───────────────────┘        └───────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linex_transport::http::{WebhookServer, WebhookState, webhook_router};
//!
//! let router = webhook_router("/callback", WebhookState::new(verifier, dispatcher));
//! let server = WebhookServer::bind("0.0.0.0:8080", router).await?;
//! server.serve(shutdown_token).await?;
//! ```

pub mod error;
pub mod http;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-client")]
pub use http::HttpApiCaller;
#[cfg(feature = "http-server")]
pub use http::{LIVENESS_TEXT, WebhookServer, WebhookState, webhook_router};
