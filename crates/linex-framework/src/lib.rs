//! # Linex Framework
//!
//! Handler registration and event dispatch for LINE bots.
//!
//! This layer provides:
//! - Axum-style handlers with parameter extraction from the context
//! - A per-client handler registry with removable registrations
//! - The dispatcher that routes webhook batches to handlers in order
//! - `wait_for`, resolved directly by the dispatcher
//! - Command and postback routers with typed arguments
//!
//! Everything here is owned by one client instance. Two dispatchers in the
//! same process share no handlers, waits or caches.

pub mod command;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod pending;
pub mod registry;

pub use command::{ArgsHandler, FromArg, Rest, command_args, postback_args, postback_data};
pub use dispatcher::{DispatchReport, Dispatcher, EmitSummary, WebhookPayload};
pub use error::{
    ArgError, ArgResult, HandlerError, HandlerResult, RegistrationError, RegistrationResult,
    WaitError, WaitResult,
};
pub use handler::{
    BoxedHandler, BoxedReadyHandler, FromContext, Handler, HandlerResponse, IntoHandlerResult,
    into_handler, into_ready_handler,
};
pub use pending::PendingWaits;
pub use registry::{HandlerId, HandlerRegistry};
