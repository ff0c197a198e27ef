//! HTTP transport.
//!
//! The webhook server receives events; the client calls the Messaging API.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::HttpApiCaller;

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{LIVENESS_TEXT, WebhookServer, WebhookState, webhook_router};
