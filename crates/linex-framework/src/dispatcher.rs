//! Event dispatcher for the Linex framework.
//!
//! The [`Dispatcher`] takes the `events` array of one webhook payload and
//! routes each event to the handlers of its channel:
//!
//! 1. Standby events are skipped when `ignore_standby` is set
//! 2. The event is decoded into a [`Context`]; decode failures are logged
//!    and the batch continues
//! 3. Pending `wait_for` requests on the channel are resolved
//! 4. Handlers on the channel run in registration order, one after another
//!
//! Events of one batch are processed strictly in array order. Handler
//! errors and panics are logged and never abort the batch.
//!
//! ```rust,ignore
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.on::<TextMessageContext, _, _>(echo);
//!
//! let dispatcher = Dispatcher::new(Arc::clone(&registry), deps);
//! let report = dispatcher.process(&payload.events).await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use linex_core::model::BotUser;
use linex_core::{Context, ContextDeps, EventContext, decode};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tracing::{Instrument, Level, debug, error, info, span, trace, warn};

use crate::error::WaitResult;
use crate::handler::invoke;
use crate::pending::PendingWaits;
use crate::registry::HandlerRegistry;

/// The body of a webhook request.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// User ID of the bot that should receive the events.
    #[serde(default)]
    pub destination: Option<String>,
    /// Raw events, decoded one by one during dispatch.
    pub events: Vec<Value>,
}

/// Outcome of processing one webhook batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Events in the batch.
    pub received: usize,
    /// Events decoded and routed to their channel.
    pub dispatched: usize,
    /// Standby events that were skipped.
    pub skipped_standby: usize,
    /// Events that failed to decode.
    pub failed: usize,
    /// Handler invocations that returned an error or panicked.
    pub handler_errors: usize,
}

/// Outcome of routing one context to one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    /// Handlers invoked.
    pub handlers: usize,
    /// Pending waits resolved.
    pub waits: usize,
    /// Handlers that returned an error or panicked.
    pub errors: usize,
}

/// Routes decoded events to registered handlers.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    pending: Arc<PendingWaits>,
    deps: ContextDeps,
    ignore_standby: bool,
    hint_shown: AtomicBool,
    bot: RwLock<Option<Arc<BotUser>>>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`, decoding with `deps`.
    ///
    /// Standby events are ignored by default.
    pub fn new(registry: Arc<HandlerRegistry>, deps: ContextDeps) -> Self {
        Self {
            registry,
            pending: Arc::new(PendingWaits::new()),
            deps,
            ignore_standby: true,
            hint_shown: AtomicBool::new(false),
            bot: RwLock::new(None),
        }
    }

    /// Sets whether standby events are skipped.
    pub fn ignore_standby(mut self, ignore: bool) -> Self {
        self.ignore_standby = ignore;
        self
    }

    /// The handler registry.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// The pending wait table.
    pub fn pending(&self) -> &Arc<PendingWaits> {
        &self.pending
    }

    /// Collaborators injected into decoded contexts.
    pub fn deps(&self) -> &ContextDeps {
        &self.deps
    }

    /// The bot account, once [`ready`](Self::ready) has run.
    pub fn bot(&self) -> Option<Arc<BotUser>> {
        self.bot.read().clone()
    }

    // =========================================================================
    // Batch processing
    // =========================================================================

    /// Processes the events of one webhook payload in order.
    pub async fn process(&self, events: &[Value]) -> DispatchReport {
        let mut report = DispatchReport {
            received: events.len(),
            ..Default::default()
        };

        if events.is_empty() {
            self.verification_hint();
            return report;
        }

        for event in events {
            if self.ignore_standby && is_standby(event) {
                trace!("Skipping standby event");
                report.skipped_standby += 1;
                continue;
            }

            match decode(event, &self.deps) {
                Ok(context) => {
                    let summary = self.dispatch(context).await;
                    report.dispatched += 1;
                    report.handler_errors += summary.errors;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to decode event, skipping");
                    report.failed += 1;
                }
            }
        }

        debug!(
            received = report.received,
            dispatched = report.dispatched,
            skipped_standby = report.skipped_standby,
            failed = report.failed,
            "Batch processed"
        );
        report
    }

    fn verification_hint(&self) {
        if self.hint_shown.swap(true, Ordering::Relaxed) {
            return;
        }
        match self.bot() {
            Some(bot) => info!(
                settings = %bot.response_settings_url(),
                "Received a webhook verification request; make sure webhooks are enabled in the response settings"
            ),
            None => info!(
                "Received a webhook verification request; make sure webhooks are enabled in the Official Account Manager"
            ),
        }
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Routes a context to the channel of its variant.
    pub async fn dispatch(&self, context: Context) -> EmitSummary {
        let channel = context.channel();
        self.emit(channel.as_str(), context).await
    }

    /// Routes a context to any channel, including user-defined ones.
    ///
    /// Pending waits on the channel are resolved first, then the handlers
    /// run in registration order.
    pub async fn emit(&self, channel: &str, context: Context) -> EmitSummary {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            channel = %channel,
            event_id = context.base().event_id()
        );

        async move {
            let mut summary = EmitSummary {
                waits: self.pending.fulfill(channel, &context),
                ..Default::default()
            };

            for handler in self.registry.handlers(channel) {
                summary.handlers += 1;
                if let Err(e) = invoke(handler(context.clone())).await {
                    summary.errors += 1;
                    error!(error = %e, "Handler failed");
                }
            }

            trace!(
                handlers = summary.handlers,
                waits = summary.waits,
                "Context dispatched"
            );
            summary
        }
        .instrument(span)
        .await
    }

    /// Stores the bot account and runs the startup handlers.
    pub async fn ready(&self, bot: Arc<BotUser>) {
        *self.bot.write() = Some(Arc::clone(&bot));

        for handler in self.registry.ready_handlers() {
            if let Err(e) = invoke(handler(Arc::clone(&bot))).await {
                error!(error = %e, "Ready handler failed");
            }
        }
        info!(bot = %bot.display_name, basic_id = %bot.basic_id, "Bot is ready");
    }

    // =========================================================================
    // Waiting
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
        self.pending.wait_for(channel, predicate, timeout).await
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
        self.pending.wait_for_context(predicate, timeout).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("pending", &self.pending)
            .field("ignore_standby", &self.ignore_standby)
            .finish()
    }
}

fn is_standby(event: &Value) -> bool {
    event.get("mode").and_then(Value::as_str) == Some("standby")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Rest;
    use crate::error::WaitError;
    use futures::future::BoxFuture;
    use linex_core::context::{PostbackContext, TextMessageContext, now_millis};
    use linex_core::model::Source;
    use linex_core::testing::MockApiCaller;
    use linex_core::{EntityCache, LineApi};
    use parking_lot::Mutex;
    use serde_json::json;

    fn setup() -> (Arc<MockApiCaller>, Dispatcher) {
        let caller = Arc::new(MockApiCaller::new());
        let deps = ContextDeps::new(Arc::new(LineApi::new(caller.clone())), EntityCache::new());
        let dispatcher = Dispatcher::new(Arc::new(HandlerRegistry::new()), deps);
        (caller, dispatcher)
    }

    fn text_event(id: &str, text: &str) -> Value {
        json!({
            "type": "message",
            "mode": "active",
            "timestamp": now_millis(),
            "webhookEventId": format!("evt-{id}"),
            "deliveryContext": { "isRedelivery": false },
            "replyToken": format!("token-{id}"),
            "source": { "type": "user", "userId": "U1" },
            "message": { "type": "text", "id": id, "quoteToken": "q", "text": text }
        })
    }

    fn postback_event(data: &str) -> Value {
        json!({
            "type": "postback",
            "mode": "active",
            "timestamp": now_millis(),
            "webhookEventId": "evt-pb",
            "deliveryContext": { "isRedelivery": false },
            "replyToken": "token-pb",
            "source": { "type": "user", "userId": "U1" },
            "postback": { "data": data }
        })
    }

    fn reply_texts(caller: &MockApiCaller) -> Vec<String> {
        caller
            .requests_to("/message/reply")
            .iter()
            .filter_map(|r| r.body.as_ref())
            .filter_map(|b| b["messages"][0]["text"].as_str().map(str::to_string))
            .collect()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn logging_handler(
        log: &Log,
        name: &'static str,
        delay: Duration,
    ) -> impl Fn(Context) -> BoxFuture<'static, ()> + Clone + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_ctx: Context| -> BoxFuture<'static, ()> {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().push(format!("{name}:start"));
                tokio::time::sleep(delay).await;
                log.lock().push(format!("{name}:end"));
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handlers_run_sequentially_in_order() {
        let (_, dispatcher) = setup();
        let log: Log = Arc::default();
        let registry = dispatcher.registry();
        registry.register("text", logging_handler(&log, "A", Duration::from_millis(30)));
        registry.register("text", logging_handler(&log, "B", Duration::from_millis(10)));
        registry.register("text", logging_handler(&log, "C", Duration::ZERO));

        let report = dispatcher.process(&[text_event("m1", "hi")]).await;

        assert_eq!(report.dispatched, 1);
        assert_eq!(
            *log.lock(),
            vec!["A:start", "A:end", "B:start", "B:end", "C:start", "C:end"]
        );
    }

    #[tokio::test]
    async fn test_unknown_event_does_not_abort_batch() {
        let (_, dispatcher) = setup();
        let count = Arc::new(Mutex::new(0));
        {
            let count = Arc::clone(&count);
            dispatcher.registry().register("text", move |_: Context| {
                let count = Arc::clone(&count);
                async move { *count.lock() += 1 }
            });
        }

        let events = vec![
            text_event("m1", "one"),
            json!({ "type": "membershipUpgraded", "timestamp": 0, "source": { "type": "user", "userId": "U1" } }),
            text_event("m2", "two"),
        ];
        let report = dispatcher.process(&events).await;

        assert_eq!(*count.lock(), 2);
        assert_eq!(
            report,
            DispatchReport {
                received: 3,
                dispatched: 2,
                skipped_standby: 0,
                failed: 1,
                handler_errors: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_standby_events() {
        let (_, dispatcher) = setup();
        let count = Arc::new(Mutex::new(0));
        {
            let count = Arc::clone(&count);
            dispatcher.registry().register("text", move |_: Context| {
                let count = Arc::clone(&count);
                async move { *count.lock() += 1 }
            });
        }

        let mut standby = text_event("m1", "quiet");
        standby["mode"] = json!("standby");
        standby.as_object_mut().unwrap().remove("replyToken");

        let report = dispatcher.process(std::slice::from_ref(&standby)).await;
        assert_eq!(report.skipped_standby, 1);
        assert_eq!(*count.lock(), 0);

        let dispatcher = Dispatcher::new(
            Arc::clone(dispatcher.registry()),
            dispatcher.deps().clone(),
        )
        .ignore_standby(false);
        let report = dispatcher.process(&[standby]).await;
        assert_eq!(report.dispatched, 1);
        assert_eq!(*count.lock(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_invokes_nothing() {
        let (caller, dispatcher) = setup();
        let count = Arc::new(Mutex::new(0));
        {
            let count = Arc::clone(&count);
            dispatcher.registry().register("text", move |_: Context| {
                let count = Arc::clone(&count);
                async move { *count.lock() += 1 }
            });
        }

        let report = dispatcher.process(&[]).await;
        assert_eq!(report, DispatchReport::default());
        assert!(dispatcher.hint_shown.load(Ordering::Relaxed));

        dispatcher.process(&[]).await;
        assert_eq!(*count.lock(), 0);
        assert!(caller.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failing_handlers_do_not_stop_dispatch() {
        let (_, dispatcher) = setup();
        let log: Log = Arc::default();
        let registry = dispatcher.registry();
        registry.register("text", |_: Context| async { Err::<(), _>("first failed") });
        registry.register("text", |source: Source| async move {
            if source.user_id() == Some("U1") {
                panic!("second panicked");
            }
        });
        registry.register("text", logging_handler(&log, "third", Duration::ZERO));

        let report = dispatcher.process(&[text_event("m1", "hi")]).await;

        assert_eq!(report.handler_errors, 2);
        assert_eq!(*log.lock(), vec!["third:start", "third:end"]);
    }

    #[tokio::test]
    async fn test_emit_custom_channel() {
        let (caller, dispatcher) = setup();
        dispatcher
            .registry()
            .register("audit", |ctx: Arc<TextMessageContext>| async move {
                format!("audited {}", ctx.text())
            });

        let context = decode(&text_event("m1", "hello"), dispatcher.deps()).unwrap();
        let summary = dispatcher.emit("audit", context).await;

        assert_eq!(summary.handlers, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(reply_texts(&caller), vec!["audited hello"]);
    }

    #[tokio::test]
    async fn test_unregistered_handler_is_not_called() {
        let (caller, dispatcher) = setup();
        let id = dispatcher
            .registry()
            .register("text", |_: Context| async { "reply".to_string() });
        assert!(dispatcher.registry().unregister(id));

        dispatcher.process(&[text_event("m1", "hi")]).await;
        assert!(caller.requests().is_empty());
    }

    #[tokio::test]
    async fn test_wait_resolved_before_handlers() {
        let (_, dispatcher) = setup();
        let dispatcher = Arc::new(dispatcher);

        let waiter = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher
                    .wait_for_context::<TextMessageContext, _>(
                        |ctx| ctx.text() == "yes",
                        Some(Duration::from_secs(5)),
                    )
                    .await
            })
        };
        while dispatcher.pending().len("text") == 0 {
            tokio::task::yield_now().await;
        }

        dispatcher
            .process(&[text_event("m1", "no"), text_event("m2", "yes")])
            .await;

        let ctx = waiter.await.unwrap().unwrap();
        assert_eq!(ctx.id(), "m2");
        assert!(dispatcher.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let (_, dispatcher) = setup();
        let err = dispatcher
            .wait_for("postback", |_| false, Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Timeout { .. }));
        assert!(dispatcher.pending().is_empty());
    }

    #[tokio::test]
    async fn test_command_end_to_end() {
        let (caller, dispatcher) = setup();
        dispatcher
            .registry()
            .command("/add", |_: Arc<TextMessageContext>, a: i64, b: i64| async move {
                format!("{}", a + b)
            })
            .unwrap();
        dispatcher
            .registry()
            .command("/say", |_: Arc<TextMessageContext>, text: Rest| async move {
                text.0
            })
            .unwrap();

        dispatcher
            .process(&[
                text_event("m1", "/add 3;4"),
                text_event("m2", "/add x;4"),
                text_event("m3", "/say a;b;c"),
                text_event("m4", "not a command"),
            ])
            .await;

        assert_eq!(reply_texts(&caller), vec!["7", "a;b;c"]);
    }

    #[tokio::test]
    async fn test_postback_end_to_end() {
        let (_, dispatcher) = setup();
        let seen: Arc<Mutex<Vec<(i64, String)>>> = Arc::default();
        {
            let seen = Arc::clone(&seen);
            dispatcher
                .registry()
                .postback("buy", move |_: Arc<PostbackContext>, qty: i64, color: String| {
                    let seen = Arc::clone(&seen);
                    async move { seen.lock().push((qty, color)) }
                })
                .unwrap();
        }

        dispatcher
            .process(&[
                postback_event("buy;3;red"),
                postback_event("buy;3"),
                postback_event("sell;1;blue"),
            ])
            .await;

        assert_eq!(*seen.lock(), vec![(3, "red".to_string())]);
    }

    #[tokio::test]
    async fn test_ready_runs_startup_handlers() {
        let (_, dispatcher) = setup();
        let names: Arc<Mutex<Vec<String>>> = Arc::default();
        {
            let names = Arc::clone(&names);
            dispatcher.registry().on_ready(move |bot: Arc<BotUser>| {
                let names = Arc::clone(&names);
                async move { names.lock().push(bot.display_name.clone()) }
            });
        }

        let bot: BotUser = serde_json::from_value(json!({
            "userId": "Ubot",
            "basicId": "@bot",
            "displayName": "Linex Bot",
            "chatMode": "bot",
            "markAsReadMode": "auto"
        }))
        .unwrap();
        dispatcher.ready(Arc::new(bot)).await;

        assert_eq!(*names.lock(), vec!["Linex Bot"]);
        assert_eq!(dispatcher.bot().unwrap().basic_id, "@bot");
    }
}
