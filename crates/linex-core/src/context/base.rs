//! State and behavior shared by every context variant.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::OnceCell;
use tracing::debug;

use crate::api::LineApi;
use crate::cache::EntityCache;
use crate::foundation::{ApiError, CannotReplyReason, ContextError, ContextResult};
use crate::model::{
    ContentProvider, Group, Message, MessageContent, Mode, ProviderType, ReplyOptions, Source,
    SourceType, User,
};

/// How long a reply token stays valid after the event timestamp.
pub const REPLY_WINDOW: Duration = Duration::from_secs(20 * 60);

/// Collaborators injected into every decoded context.
#[derive(Clone, Debug)]
pub struct ContextDeps {
    /// API client used for enrichment and replies.
    pub api: Arc<LineApi>,
    /// Cache that fetched entities are written to.
    pub cache: EntityCache,
}

impl ContextDeps {
    /// Bundles the collaborators.
    pub fn new(api: Arc<LineApi>, cache: EntityCache) -> Self {
        Self { api, cache }
    }
}

/// Envelope fields shared by all events.
#[derive(Debug, Clone)]
pub struct EventMeta {
    /// Raw event type, e.g. `message` or `memberJoined`.
    pub kind: String,
    /// Webhook event ID.
    pub event_id: String,
    /// Whether the platform is redelivering this event.
    pub is_redelivery: bool,
    /// Event time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Where the event came from.
    pub source: Source,
    /// Channel mode.
    pub mode: Mode,
    /// Reply token, when the event can be replied to.
    pub reply_token: Option<String>,
}

/// The part of a context that every variant shares.
///
/// Variant contexts dereference to this type, so `ctx.source()` or
/// `ctx.author().await` work on any of them.
pub struct ContextBase {
    meta: EventMeta,
    deps: ContextDeps,
    author: OnceCell<Arc<User>>,
    group: OnceCell<Arc<Group>>,
    replied: AtomicBool,
}

impl ContextBase {
    /// Creates the shared part of a context.
    pub fn new(meta: EventMeta, deps: ContextDeps) -> Self {
        Self {
            meta,
            deps,
            author: OnceCell::new(),
            group: OnceCell::new(),
            replied: AtomicBool::new(false),
        }
    }

    /// Returns the envelope fields.
    pub fn meta(&self) -> &EventMeta {
        &self.meta
    }

    /// Raw event type.
    pub fn event_type(&self) -> &str {
        &self.meta.kind
    }

    /// Webhook event ID.
    pub fn event_id(&self) -> &str {
        &self.meta.event_id
    }

    /// Whether the platform is redelivering this event.
    pub fn is_redelivery(&self) -> bool {
        self.meta.is_redelivery
    }

    /// Event time in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.meta.timestamp
    }

    /// Where the event came from.
    pub fn source(&self) -> &Source {
        &self.meta.source
    }

    /// Kind of the event source.
    pub fn source_type(&self) -> SourceType {
        self.meta.source.kind()
    }

    /// Channel mode at the time of the event.
    pub fn mode(&self) -> Mode {
        self.meta.mode
    }

    /// Whether the channel was active, i.e. allowed to respond.
    pub fn is_active(&self) -> bool {
        self.meta.mode == Mode::Active
    }

    /// Time elapsed since the event timestamp.
    pub fn latency(&self) -> Duration {
        let elapsed = now_millis().saturating_sub(self.meta.timestamp);
        Duration::from_millis(elapsed.max(0) as u64)
    }

    /// The API client this context was decoded with.
    pub fn api(&self) -> &Arc<LineApi> {
        &self.deps.api
    }

    /// The entity cache this context writes to.
    pub fn cache(&self) -> &EntityCache {
        &self.deps.cache
    }

    // =========================================================================
    // Lazy enrichment
    // =========================================================================

    /// Fetches the profile of the user who triggered the event.
    ///
    /// The first call hits the API; later calls on the same context return
    /// the memoized value.
    pub async fn author(&self) -> ContextResult<Arc<User>> {
        let user_id = self.source().user_id().ok_or(ContextError::MissingAuthor)?;

        let user = self
            .author
            .get_or_try_init(|| async {
                let user = self.deps.api.profile(user_id).await?;
                Ok::<_, ApiError>(self.deps.cache.insert_user(user))
            })
            .await?;
        Ok(Arc::clone(user))
    }

    /// Fetches the summary of the group the event came from.
    ///
    /// Fails with [`ContextError::NotGroupContext`] for user and room sources.
    pub async fn group(&self) -> ContextResult<Arc<Group>> {
        let group_id = self
            .source()
            .group_id()
            .ok_or(ContextError::NotGroupContext)?;

        let group = self
            .group
            .get_or_try_init(|| async {
                let group = self.deps.api.group_summary(group_id).await?;
                Ok::<_, ApiError>(self.deps.cache.insert_group(group))
            })
            .await?;
        Ok(Arc::clone(group))
    }

    /// Counts the members of the group the event came from.
    pub async fn group_member_count(&self) -> ContextResult<u64> {
        let group_id = self
            .source()
            .group_id()
            .ok_or(ContextError::NotGroupContext)?;
        Ok(self.deps.api.group_member_count(group_id).await?)
    }

    /// Pushes messages to the chat the event came from.
    pub async fn push<I>(&self, messages: I) -> ContextResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Message>,
    {
        let messages = messages.into_iter().map(Into::into).collect();
        self.deps
            .api
            .push(self.source().target_id(), messages, false)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Reply state
    // =========================================================================

    pub(crate) fn reply_token(&self) -> Option<&str> {
        self.meta.reply_token.as_deref()
    }

    pub(crate) fn has_replied(&self) -> bool {
        self.replied.load(Ordering::Acquire)
    }

    /// Checks the reply preconditions and sends the reply.
    ///
    /// The replied flag flips before the request goes out and stays set even
    /// if the request fails.
    pub(crate) async fn send_reply(
        &self,
        mut messages: Vec<Message>,
        options: &ReplyOptions,
    ) -> ContextResult<()> {
        let token = self
            .reply_token()
            .ok_or(ContextError::CannotReply(CannotReplyReason::MissingToken))?;

        if now_millis().saturating_sub(self.meta.timestamp) > REPLY_WINDOW.as_millis() as i64 {
            return Err(ContextError::CannotReply(CannotReplyReason::Expired));
        }

        if self.replied.swap(true, Ordering::AcqRel) {
            return Err(ContextError::CannotReply(CannotReplyReason::AlreadyReplied));
        }

        options.apply(&mut messages);
        debug!(
            event_id = %self.meta.event_id,
            count = messages.len(),
            "Sending reply"
        );
        self.deps
            .api
            .reply(token, messages, options.notification_disabled)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Content download
    // =========================================================================

    /// Downloads message content from the platform or an external provider.
    pub(crate) async fn download(
        &self,
        message_id: &str,
        provider: Option<&ContentProvider>,
    ) -> ContextResult<MessageContent> {
        let content = match provider {
            Some(ContentProvider {
                kind: ProviderType::External,
                original_content_url,
                ..
            }) => {
                let url = original_content_url.as_deref().ok_or_else(|| {
                    ApiError::NotFound(format!("external content of message {message_id}"))
                })?;
                self.deps.api.fetch_external(url).await?
            }
            _ => self.deps.api.message_content(message_id).await?,
        };
        Ok(content)
    }
}

impl std::fmt::Debug for ContextBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBase")
            .field("meta", &self.meta)
            .field("replied", &self.has_replied())
            .finish_non_exhaustive()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
