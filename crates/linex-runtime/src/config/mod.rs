//! Configuration module for the Linex runtime.
//!
//! This module provides layered configuration loading (defaults, files,
//! environment) and validation of the channel, server, API and logging
//! settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    ApiConfig, ChannelConfig, DispatchConfig, LinexConfig, LogFormat, LogLevel, LogOutput,
    LoggingConfig, ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
