//! Pending `wait_for` requests.
//!
//! A waiter registers a predicate on a channel and parks on a oneshot
//! receiver. When the dispatcher routes a context to that channel, every
//! waiter whose predicate accepts the context receives a clone of it and is
//! removed. Non-matching waiters stay registered.
//!
//! Dropping the wait future (on timeout or cancellation) removes its entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use linex_core::{Context, EventContext};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{WaitError, WaitResult};

type Predicate = Box<dyn Fn(&Context) -> bool + Send + Sync>;

struct Waiter {
    id: Uuid,
    predicate: Predicate,
    sender: oneshot::Sender<Context>,
}

/// The pending wait table of one dispatcher.
#[derive(Default)]
pub struct PendingWaits {
    waiters: Mutex<HashMap<String, Vec<Waiter>>>,
}

impl PendingWaits {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next context on `channel` accepted by `predicate`.
    ///
    /// `timeout = None` waits indefinitely.
    pub async fn wait_for<P>(
        self: &Arc<Self>,
        channel: &str,
        predicate: P,
        timeout: Option<Duration>,
    ) -> WaitResult<Context>
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let (sender, receiver) = oneshot::channel();
        self.waiters
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(Waiter {
                id,
                predicate: Box::new(predicate),
                sender,
            });
        debug!(channel, %id, "Registered pending wait");

        let _guard = WaitGuard {
            table: Arc::clone(self),
            channel: channel.to_string(),
            id,
        };

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, receiver)
                .await
                .map_err(|_| WaitError::Timeout {
                    channel: channel.to_string(),
                })?,
            None => receiver.await,
        };
        received.map_err(|_| WaitError::Closed {
            channel: channel.to_string(),
        })
    }

    /// Waits for the next `C` on its own channel accepted by `predicate`.
    pub async fn wait_for_context<C, P>(
        self: &Arc<Self>,
        predicate: P,
        timeout: Option<Duration>,
    ) -> WaitResult<Arc<C>>
    where
        C: EventContext,
        P: Fn(&C) -> bool + Send + Sync + 'static,
    {
        let channel = C::CHANNEL.as_str();
        let context = self
            .wait_for(
                channel,
                move |ctx| C::extract(ctx).is_some_and(|typed| predicate(typed.as_ref())),
                timeout,
            )
            .await?;
        C::extract(&context).ok_or_else(|| WaitError::Closed {
            channel: channel.to_string(),
        })
    }

    /// Hands `context` to every matching waiter on `channel`.
    ///
    /// Returns the number of waiters resolved.
    pub fn fulfill(&self, channel: &str, context: &Context) -> usize {
        let mut waiters = self.waiters.lock();
        let Some(entries) = waiters.get_mut(channel) else {
            return 0;
        };

        let mut resolved = 0;
        let mut remaining = Vec::with_capacity(entries.len());
        for waiter in entries.drain(..) {
            if waiter.sender.is_closed() {
                continue;
            }
            if (waiter.predicate)(context) {
                if waiter.sender.send(context.clone()).is_ok() {
                    resolved += 1;
                }
            } else {
                remaining.push(waiter);
            }
        }

        if remaining.is_empty() {
            waiters.remove(channel);
        } else {
            *entries = remaining;
        }

        if resolved > 0 {
            trace!(channel, resolved, "Resolved pending waits");
        }
        resolved
    }

    /// Number of outstanding waits on `channel`.
    pub fn len(&self, channel: &str) -> usize {
        self.waiters.lock().get(channel).map_or(0, Vec::len)
    }

    /// Whether no wait is outstanding on any channel.
    pub fn is_empty(&self) -> bool {
        self.waiters.lock().values().all(Vec::is_empty)
    }

    /// Drops every outstanding wait; their futures resolve to
    /// [`WaitError::Closed`].
    pub fn clear(&self) {
        self.waiters.lock().clear();
    }

    fn remove(&self, channel: &str, id: Uuid) {
        let mut waiters = self.waiters.lock();
        if let Some(entries) = waiters.get_mut(channel) {
            entries.retain(|waiter| waiter.id != id);
            if entries.is_empty() {
                waiters.remove(channel);
            }
        }
    }
}

impl fmt::Debug for PendingWaits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let waiters = self.waiters.lock();
        let counts: HashMap<&str, usize> = waiters
            .iter()
            .map(|(channel, entries)| (channel.as_str(), entries.len()))
            .collect();
        f.debug_struct("PendingWaits")
            .field("waiters", &counts)
            .finish()
    }
}

/// Removes a waiter when its future completes or is dropped.
struct WaitGuard {
    table: Arc<PendingWaits>,
    channel: String,
    id: Uuid,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.table.remove(&self.channel, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linex_core::context::{TextMessageContext, now_millis};
    use linex_core::testing::MockApiCaller;
    use linex_core::{ContextDeps, EntityCache, LineApi, decode};
    use serde_json::json;
    use tokio::time::Instant;
    use tokio_test::{assert_pending, assert_ready, task};

    fn deps() -> ContextDeps {
        let api = Arc::new(LineApi::new(Arc::new(MockApiCaller::new())));
        ContextDeps::new(api, EntityCache::new())
    }

    fn text(deps: &ContextDeps, body: &str) -> Context {
        let event = json!({
            "type": "message",
            "timestamp": now_millis(),
            "replyToken": "token",
            "source": { "type": "user", "userId": "U1" },
            "message": { "type": "text", "id": body, "text": body }
        });
        decode(&event, deps).unwrap()
    }

    fn message_text(ctx: &Context) -> String {
        TextMessageContext::extract(ctx)
            .map(|t| t.text().to_string())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_matching_context_resolves_wait() {
        let table = Arc::new(PendingWaits::new());
        let deps = deps();

        let mut wait = task::spawn(table.wait_for("text", |ctx| message_text(ctx) == "yes", None));
        assert_pending!(wait.poll());
        assert_eq!(table.len("text"), 1);

        assert_eq!(table.fulfill("text", &text(&deps, "no")), 0);
        assert_pending!(wait.poll());

        assert_eq!(table.fulfill("text", &text(&deps, "yes")), 1);
        assert!(wait.is_woken());
        let resolved = assert_ready!(wait.poll()).unwrap();
        assert_eq!(message_text(&resolved), "yes");
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_other_channels_untouched() {
        let table = Arc::new(PendingWaits::new());
        let deps = deps();

        let mut wait = task::spawn(table.wait_for("postback", |_| true, None));
        assert_pending!(wait.poll());

        assert_eq!(table.fulfill("text", &text(&deps, "hi")), 0);
        assert_pending!(wait.poll());
        assert_eq!(table.len("postback"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let table = Arc::new(PendingWaits::new());
        let started = Instant::now();

        let err = table
            .wait_for("text", |_| true, Some(Duration::from_secs(1)))
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert_eq!(
            err,
            WaitError::Timeout {
                channel: "text".to_string()
            }
        );
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1100));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_wait_is_removed() {
        let table = Arc::new(PendingWaits::new());

        let mut wait = task::spawn(table.wait_for("text", |_| true, None));
        assert_pending!(wait.poll());
        assert_eq!(table.len("text"), 1);

        drop(wait);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_clear_closes_waits() {
        let table = Arc::new(PendingWaits::new());

        let mut wait = task::spawn(table.wait_for("text", |_| true, None));
        assert_pending!(wait.poll());

        table.clear();
        let err = assert_ready!(wait.poll()).unwrap_err();
        assert_eq!(
            err,
            WaitError::Closed {
                channel: "text".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_typed_wait() {
        let table = Arc::new(PendingWaits::new());
        let deps = deps();

        let waiter = {
            let table = Arc::clone(&table);
            tokio::spawn(async move {
                table
                    .wait_for_context::<TextMessageContext, _>(
                        |ctx| ctx.text().starts_with("confirm"),
                        Some(Duration::from_secs(5)),
                    )
                    .await
            })
        };
        while table.len("text") == 0 {
            tokio::task::yield_now().await;
        }

        table.fulfill("text", &text(&deps, "maybe"));
        table.fulfill("text", &text(&deps, "confirm order"));

        let ctx = waiter.await.unwrap().unwrap();
        assert_eq!(ctx.text(), "confirm order");
        assert!(table.is_empty());
    }
}
