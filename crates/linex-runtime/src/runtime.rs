//! The client runtime: one bot, one channel, one webhook server.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use linex_runtime::LinexRuntime;
//!
//! // Auto-loads linex.toml and LINEX_* variables
//! let runtime = LinexRuntime::new()?;
//!
//! // Custom configuration path
//! let runtime = LinexRuntime::builder()
//!     .config_file("config/linex.toml")
//!     .profile("production")
//!     .build()?;
//!
//! // Use pre-loaded config
//! let config = ConfigLoader::new().load()?;
//! let runtime = LinexRuntime::from_config(&config)?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use linex_core::context::{PostbackContext, TextMessageContext};
use linex_core::model::{BotUser, Group, User, WebhookEndpoint, WebhookTest};
use linex_core::{
    ApiCaller, ApiResult, Context, ContextDeps, EntityCache, EventContext, LineApi, LookupResult,
    SignatureVerifier,
};
use linex_framework::{
    ArgsHandler, Dispatcher, EmitSummary, Handler, HandlerId, HandlerRegistry, IntoHandlerResult,
    RegistrationResult, WaitResult,
};
use linex_transport::{HttpApiCaller, WebhookServer, WebhookState, webhook_router};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, LinexConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// The Linex client.
///
/// Owns its handler registry, pending waits, entity cache and rate limit
/// buckets. Two runtimes in one process share none of them.
///
/// ```rust,ignore
/// let runtime = LinexRuntime::new()?;
///
/// runtime.command("add", |ctx: Arc<TextMessageContext>, a: i64, b: i64| async move {
///     (a + b).to_string()
/// })?;
/// runtime.run().await?;
/// ```
pub struct LinexRuntime {
    config: LinexConfig,
    api: Arc<LineApi>,
    registry: Arc<HandlerRegistry>,
    dispatcher: Arc<Dispatcher>,
    verifier: SignatureVerifier,
    shutdown: CancellationToken,
}

impl LinexRuntime {
    /// Creates a runtime from `linex.toml` in the current directory and the
    /// environment.
    pub fn new() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration.
    ///
    /// Validates the configuration, initializes logging and builds the
    /// HTTP client. Missing channel credentials are an error.
    pub fn from_config(config: &LinexConfig) -> RuntimeResult<Self> {
        validate_config(config)?;
        logging::init_from_config(&config.logging);

        let caller = HttpApiCaller::with_timeout(config.channel.access_token()?, config.api.timeout())?
            .with_api_bases([config.api.base_url.as_str(), config.api.data_base_url.as_str()]);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );

        Self::assemble(config, Arc::new(caller))
    }

    /// Creates a runtime that sends API calls through `caller`.
    ///
    /// Logging is left untouched.
    pub fn with_caller(config: &LinexConfig, caller: Arc<dyn ApiCaller>) -> RuntimeResult<Self> {
        validate_config(config)?;
        Self::assemble(config, caller)
    }

    fn assemble(config: &LinexConfig, caller: Arc<dyn ApiCaller>) -> RuntimeResult<Self> {
        let verifier = SignatureVerifier::new(config.channel.secret()?);
        let api = Arc::new(LineApi::with_base_urls(
            caller,
            &config.api.base_url,
            &config.api.data_base_url,
        ));
        let registry = Arc::new(HandlerRegistry::new());
        let deps = ContextDeps::new(Arc::clone(&api), EntityCache::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), deps)
            .ignore_standby(config.dispatch.ignore_standby);

        Ok(Self {
            config: config.clone(),
            api,
            registry,
            dispatcher: Arc::new(dispatcher),
            verifier,
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &LinexConfig {
        &self.config
    }

    /// Returns the Messaging API client.
    pub fn api(&self) -> &Arc<LineApi> {
        &self.api
    }

    /// Returns the entity cache.
    pub fn cache(&self) -> &EntityCache {
        &self.dispatcher.deps().cache
    }

    /// Returns the dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Returns the bot's own account once `start` has fetched it.
    pub fn bot(&self) -> Option<Arc<BotUser>> {
        self.dispatcher.bot()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a handler typed on one context variant.
    pub fn on<C, F, T>(&self, handler: F) -> HandlerId
    where
        C: EventContext,
        F: Handler<T>,
        T: 'static,
    {
        self.registry.on::<C, F, T>(handler)
    }

    /// Registers a handler on any channel, including custom ones.
    pub fn register<F, T>(&self, channel: impl AsRef<str>, handler: F) -> HandlerId
    where
        F: Handler<T>,
        T: 'static,
    {
        self.registry.register(channel, handler)
    }

    /// Removes a handler. Returns whether it was registered.
    pub fn unregister(&self, id: HandlerId) -> bool {
        self.registry.unregister(id)
    }

    /// Registers a text command.
    pub fn command<F, T>(&self, name: impl Into<String>, handler: F) -> RegistrationResult<HandlerId>
    where
        F: ArgsHandler<TextMessageContext, T>,
        T: 'static,
    {
        self.registry.command(name, handler)
    }

    /// Registers a postback route.
    pub fn postback<F, T>(&self, name: impl Into<String>, handler: F) -> RegistrationResult<HandlerId>
    where
        F: ArgsHandler<PostbackContext, T>,
        T: 'static,
    {
        self.registry.postback(name, handler)
    }

    /// Registers a handler run at startup with the bot's own account.
    pub fn on_ready<F, Fut>(&self, handler: F) -> HandlerId
    where
        F: Fn(Arc<BotUser>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.registry.on_ready(handler)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Waits for the next context on `channel` accepted by `predicate`.
    pub async fn wait_for<P>(
        &self,
        channel: &str,
        predicate: P,
        timeout: Option<Duration>,
    ) -> WaitResult<Context>
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.dispatcher.wait_for(channel, predicate, timeout).await
    }

    /// Waits for the next `C` accepted by `predicate`.
    pub async fn wait_for_context<C, P>(
        &self,
        predicate: P,
        timeout: Option<Duration>,
    ) -> WaitResult<Arc<C>>
    where
        C: EventContext,
        P: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.dispatcher.wait_for_context(predicate, timeout).await
    }

    /// Dispatches `context` on `channel`.
    pub async fn emit(&self, channel: &str, context: Context) -> EmitSummary {
        self.dispatcher.emit(channel, context).await
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Looks up a user seen by this client.
    pub fn get_user(&self, user_id: &str) -> LookupResult<Arc<User>> {
        self.cache().user(user_id)
    }

    /// Looks up a group seen by this client.
    pub fn get_group(&self, group_id: &str) -> LookupResult<Arc<Group>> {
        self.cache().group(group_id)
    }

    /// Looks up a message context received by this client.
    pub fn get_message(&self, message_id: &str) -> LookupResult<Context> {
        self.cache().message(message_id)
    }

    /// Empties the entity cache.
    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    /// Webhook endpoint settings.
    pub fn webhook(&self) -> Webhook<'_> {
        Webhook { api: &self.api }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Fetches the bot's account and runs the ready handlers.
    pub async fn start(&self) -> RuntimeResult<Arc<BotUser>> {
        let bot = Arc::new(self.api.bot_info().await?);
        info!(
            bot = %bot.display_name,
            basic_id = %bot.basic_id,
            "Fetched bot info"
        );
        self.dispatcher.ready(Arc::clone(&bot)).await;
        Ok(bot)
    }

    /// Binds the webhook server on the configured address.
    pub async fn bind(&self) -> RuntimeResult<WebhookServer> {
        let state = WebhookState::new(self.verifier.clone(), Arc::clone(&self.dispatcher));
        let router = webhook_router(&self.config.server.path, state);
        Ok(WebhookServer::bind(self.config.server.bind_addr(), router).await?)
    }

    /// Runs until Ctrl+C, SIGTERM or [`stop`](Self::stop).
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes or [`stop`](Self::stop) is called.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        let server = self.bind().await?;
        let addr = server.local_addr()?;
        info!(
            addr = %addr,
            path = %self.config.server.path,
            "Linex is running. Press Ctrl+C to stop."
        );

        let token = self.shutdown.child_token();
        let serve = async {
            let result = server.serve(token.clone()).await;
            token.cancel();
            result
        };
        let watch = async {
            tokio::select! {
                () = shutdown => token.cancel(),
                () = token.cancelled() => {}
            }
        };

        let (result, ()) = tokio::join!(serve, watch);
        result?;
        info!("Runtime stopped");
        Ok(())
    }

    /// Stops a running server. A stopped runtime cannot run again.
    pub fn stop(&self) {
        info!("Stopping Linex runtime");
        self.shutdown.cancel();
    }
}

impl Drop for LinexRuntime {
    fn drop(&mut self) {
        // Cached message contexts hold the cache itself.
        self.cache().clear();
    }
}

impl std::fmt::Debug for LinexRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinexRuntime")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Webhook settings
// =============================================================================

/// Webhook endpoint settings of the channel.
#[derive(Debug, Clone, Copy)]
pub struct Webhook<'a> {
    api: &'a LineApi,
}

impl Webhook<'_> {
    /// Returns the configured endpoint.
    pub async fn endpoint(&self) -> ApiResult<WebhookEndpoint> {
        self.api.webhook_endpoint().await
    }

    /// Sets the endpoint URL.
    pub async fn set_endpoint(&self, url: &str) -> ApiResult<()> {
        self.api.set_webhook_endpoint(url).await
    }

    /// Asks the platform to send a test delivery to `url`, or to the
    /// configured endpoint.
    pub async fn test(&self, url: Option<&str>) -> ApiResult<WebhookTest> {
        self.api.test_webhook_endpoint(url).await
    }
}

// =============================================================================
// Shutdown
// =============================================================================

/// Waits for Ctrl+C or, on unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a `LinexRuntime` with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = LinexRuntime::builder()
///     .config_file("config/production.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: LinexConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads the configuration without building a runtime.
    pub fn load(self) -> ConfigResult<LinexConfig> {
        self.config_loader.load()
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<LinexRuntime> {
        let config = self.load()?;
        LinexRuntime::from_config(&config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
