//! Handler system for the Linex framework.
//!
//! Handlers are plain async functions. Their parameters are extracted from
//! the dispatched [`Context`] through [`FromContext`], and their return value
//! is processed through [`HandlerResponse`]:
//!
//! ```rust,ignore
//! use linex_core::prelude::*;
//!
//! // Typed on one variant: only runs for text messages
//! async fn echo(ctx: Arc<TextMessageContext>) -> String {
//!     ctx.text().to_string()
//! }
//!
//! // Any context, plus the event source
//! async fn audit(ctx: Context, source: Source) {
//!     tracing::info!(channel = %ctx.channel(), target = source.target_id(), "event");
//! }
//!
//! // Errors are logged by the dispatcher
//! async fn greet(ctx: Arc<FollowContext>) -> ContextResult<()> {
//!     ctx.reply(["Thanks for adding me!"]).await
//! }
//! ```
//!
//! If a parameter cannot be extracted (say, an `Arc<PostbackContext>`
//! handler registered on the `text` channel), the handler is skipped.

use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use linex_core::model::{BotUser, Message, ReplyOptions, Source};
use linex_core::{Channel, Context, EntityCache, EventContext};

use crate::error::{HandlerError, HandlerResult};

// ============================================================================
// FromContext - Parameter extraction
// ============================================================================

/// Types that can be pulled out of a dispatched context.
///
/// Returning `None` skips the handler.
pub trait FromContext: Sized {
    /// Extracts the value.
    fn from_context(ctx: &Context) -> Option<Self>;
}

impl FromContext for Context {
    fn from_context(ctx: &Context) -> Option<Self> {
        Some(ctx.clone())
    }
}

impl<C: EventContext> FromContext for Arc<C> {
    fn from_context(ctx: &Context) -> Option<Self> {
        C::extract(ctx)
    }
}

impl FromContext for Source {
    fn from_context(ctx: &Context) -> Option<Self> {
        Some(ctx.base().source().clone())
    }
}

impl FromContext for Channel {
    fn from_context(ctx: &Context) -> Option<Self> {
        Some(ctx.channel())
    }
}

impl FromContext for EntityCache {
    fn from_context(ctx: &Context) -> Option<Self> {
        Some(ctx.base().cache().clone())
    }
}

// ============================================================================
// HandlerResponse - Handle handler return values
// ============================================================================

/// Types that can be returned from event handlers.
#[async_trait]
pub trait HandlerResponse: Send + 'static {
    /// Performs the side effects of the return value.
    async fn process_response(self, ctx: &Context) -> HandlerResult;
}

/// No response.
#[async_trait]
impl HandlerResponse for () {
    async fn process_response(self, _ctx: &Context) -> HandlerResult {
        Ok(())
    }
}

/// Replies with a text message.
#[async_trait]
impl HandlerResponse for String {
    async fn process_response(self, ctx: &Context) -> HandlerResult {
        vec![Message::from(self)].process_response(ctx).await
    }
}

/// Replies with one message.
#[async_trait]
impl HandlerResponse for Message {
    async fn process_response(self, ctx: &Context) -> HandlerResult {
        vec![self].process_response(ctx).await
    }
}

/// Replies with several messages.
#[async_trait]
impl HandlerResponse for Vec<Message> {
    async fn process_response(self, ctx: &Context) -> HandlerResult {
        if self.is_empty() {
            return Ok(());
        }
        ctx.reply_with(self, ReplyOptions::default()).await?;
        Ok(())
    }
}

/// On `Some`, the inner value is processed.
#[async_trait]
impl<T: HandlerResponse> HandlerResponse for Option<T> {
    async fn process_response(self, ctx: &Context) -> HandlerResult {
        match self {
            Some(t) => t.process_response(ctx).await,
            None => Ok(()),
        }
    }
}

/// On `Ok`, the inner value is processed; `Err` is reported to the dispatcher.
#[async_trait]
impl<T: HandlerResponse, E: Display + Send + 'static> HandlerResponse for Result<T, E> {
    async fn process_response(self, ctx: &Context) -> HandlerResult {
        match self {
            Ok(t) => t.process_response(ctx).await,
            Err(e) => Err(HandlerError::failed(e)),
        }
    }
}

/// Return values of handlers that run without a context, such as ready
/// handlers.
pub trait IntoHandlerResult {
    /// Converts the value.
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E: Display> IntoHandlerResult for Result<(), E> {
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(HandlerError::failed)
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// An event handler.
///
/// Implemented for async functions taking up to four [`FromContext`]
/// parameters and returning a [`HandlerResponse`].
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// Calls the handler with the given context.
    fn call(self, ctx: Context) -> BoxFuture<'static, HandlerResult>;
}

/// A type-erased handler stored in the registry.
pub type BoxedHandler = Arc<dyn Fn(Context) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A type-erased startup handler.
pub type BoxedReadyHandler =
    Arc<dyn Fn(Arc<BotUser>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Converts a handler function into a boxed handler.
pub fn into_handler<F, T>(f: F) -> BoxedHandler
where
    F: Handler<T>,
    T: 'static,
{
    Arc::new(move |ctx| f.clone().call(ctx))
}

/// Converts a startup handler function into a boxed handler.
pub fn into_ready_handler<F, Fut>(f: F) -> BoxedReadyHandler
where
    F: Fn(Arc<BotUser>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    Arc::new(move |bot| -> BoxFuture<'static, HandlerResult> {
        let fut = f(bot);
        Box::pin(async move { fut.await.into_handler_result() })
    })
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: HandlerResponse,
            $( $ty: FromContext + Send + 'static, )*
        {
            fn call(self, ctx: Context) -> BoxFuture<'static, HandlerResult> {
                Box::pin(async move {
                    $(
                        let Some($ty) = $ty::from_context(&ctx) else { return Ok(()) };
                    )*

                    let res = (self)($($ty,)*).await;
                    res.process_response(&ctx).await
                })
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);

// ============================================================================
// Invocation
// ============================================================================

/// Runs a handler future, turning a panic into [`HandlerError::Panicked`].
pub(crate) async fn invoke(fut: BoxFuture<'static, HandlerResult>) -> HandlerResult {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linex_core::prelude::*;
    use linex_core::testing::MockApiCaller;
    use linex_core::{ContextDeps, LineApi, decode};
    use serde_json::json;

    fn text_context(caller: Arc<MockApiCaller>) -> Context {
        let deps = ContextDeps::new(Arc::new(LineApi::new(caller)), EntityCache::new());
        let event = json!({
            "type": "message",
            "timestamp": linex_core::context::now_millis(),
            "webhookEventId": "01H",
            "replyToken": "reply-token",
            "source": { "type": "user", "userId": "U1" },
            "message": { "type": "text", "id": "m1", "text": "ping" }
        });
        decode(&event, &deps).unwrap()
    }

    #[tokio::test]
    async fn test_string_return_replies() {
        let caller = Arc::new(MockApiCaller::new());
        let handler = into_handler(|ctx: Arc<TextMessageContext>| async move {
            format!("{}: pong", ctx.text())
        });

        handler(text_context(caller.clone())).await.unwrap();

        let replies = caller.requests_to("/message/reply");
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].body.as_ref().unwrap()["messages"][0]["text"],
            "ping: pong"
        );
    }

    #[tokio::test]
    async fn test_mismatched_context_skips() {
        let caller = Arc::new(MockApiCaller::new());
        let handler = into_handler(|_: Arc<PostbackContext>| async { "never".to_string() });

        handler(text_context(caller.clone())).await.unwrap();
        assert!(caller.requests().is_empty());
    }

    #[tokio::test]
    async fn test_error_return_is_reported() {
        let caller = Arc::new(MockApiCaller::new());
        let handler = into_handler(|_: Context, _: Source| async {
            Err::<(), _>("boom")
        });

        let err = handler(text_context(caller)).await.unwrap_err();
        assert!(matches!(err, HandlerError::Failed(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let caller = Arc::new(MockApiCaller::new());
        let handler = into_handler(|channel: Channel| async move {
            if channel == Channel::Text {
                panic!("handler exploded");
            }
        });

        let err = invoke(handler(text_context(caller))).await.unwrap_err();
        assert!(matches!(err, HandlerError::Panicked(ref m) if m == "handler exploded"));
    }
}
