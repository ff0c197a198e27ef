//! The typed context model.
//!
//! Every webhook event decodes into exactly one [`Context`] variant. The set
//! of variants is closed: adding an event kind means adding a variant, and
//! every `match` over [`Context`] or [`Channel`] has to account for it.
//!
//! # Capabilities
//!
//! Two traits describe what a context can do:
//!
//! - [`EventContext`]: implemented by every variant. Gives access to the
//!   shared [`ContextBase`] (event id, timestamp, source, lazy `author()` and
//!   `group()` lookups) and ties the type to its dispatch [`Channel`].
//! - [`Repliable`]: implemented only by variants whose events carry a reply
//!   token. Calling `reply` on an unfollow or leave context does not compile.
//!
//! ```rust,ignore
//! use linex_core::context::{Repliable, TextMessageContext};
//!
//! async fn echo(ctx: Arc<TextMessageContext>) -> ContextResult<()> {
//!     let author = ctx.author().await?;
//!     ctx.reply([format!("{} said: {}", author.display_name, ctx.text())]).await
//! }
//! ```

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

pub mod base;
pub mod decode;
pub mod event;
pub mod message;

pub use base::{ContextBase, ContextDeps, EventMeta, REPLY_WINDOW, now_millis};
pub use decode::decode;
pub use event::*;
pub use message::*;

use crate::foundation::{CannotReplyReason, ContextError, ContextResult};
use crate::model::{Message, ReplyOptions};

// ============================================================================
// Channel
// ============================================================================

/// The dispatch category of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Text messages.
    Text,
    /// Image messages.
    Image,
    /// Video messages.
    Video,
    /// Audio messages.
    Audio,
    /// File messages.
    File,
    /// Location messages.
    Location,
    /// Sticker messages.
    Sticker,
    /// Messages taken back.
    Unsend,
    /// Friend added or unblocked.
    Follow,
    /// Account blocked.
    Unfollow,
    /// Bot joined a chat.
    Join,
    /// Bot left a chat.
    Leave,
    /// Users joined a chat.
    MemberJoin,
    /// Users left a chat.
    MemberLeave,
    /// Postback actions.
    Postback,
    /// Tracked video watched to the end.
    VideoComplete,
    /// Beacon events.
    Beacon,
    /// Account link results.
    AccountLink,
    /// LINE Things device linked.
    DeviceLink,
    /// LINE Things device unlinked.
    DeviceUnlink,
    /// LINE Things scenario results.
    ScenarioResult,
}

impl Channel {
    /// Every built-in channel.
    pub const ALL: [Channel; 21] = [
        Self::Text,
        Self::Image,
        Self::Video,
        Self::Audio,
        Self::File,
        Self::Location,
        Self::Sticker,
        Self::Unsend,
        Self::Follow,
        Self::Unfollow,
        Self::Join,
        Self::Leave,
        Self::MemberJoin,
        Self::MemberLeave,
        Self::Postback,
        Self::VideoComplete,
        Self::Beacon,
        Self::AccountLink,
        Self::DeviceLink,
        Self::DeviceUnlink,
        Self::ScenarioResult,
    ];

    /// Returns the channel name handlers register under.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
            Self::Location => "location",
            Self::Sticker => "sticker",
            Self::Unsend => "unsend",
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::MemberJoin => "member_join",
            Self::MemberLeave => "member_leave",
            Self::Postback => "postback",
            Self::VideoComplete => "video_complete",
            Self::Beacon => "beacon",
            Self::AccountLink => "account_link",
            Self::DeviceLink => "device_link",
            Self::DeviceUnlink => "device_unlink",
            Self::ScenarioResult => "scenario_result",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| format!("unknown channel: {s}"))
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Implemented by every context variant.
pub trait EventContext:
    Deref<Target = ContextBase> + fmt::Debug + Send + Sync + Sized + 'static
{
    /// The channel contexts of this type are dispatched on.
    const CHANNEL: Channel;

    /// Returns the shared part of the context.
    fn base(&self) -> &ContextBase;

    /// Returns the inner context if `context` is of this type.
    fn extract(context: &Context) -> Option<Arc<Self>>;

    /// Wraps the context into the [`Context`] enum.
    fn wrap(self: Arc<Self>) -> Context;
}

/// Implemented by contexts whose events can be replied to.
///
/// A context can be replied to at most once, and only within
/// [`REPLY_WINDOW`] of the event timestamp.
#[async_trait]
pub trait Repliable: EventContext {
    /// The reply token, if the event carried one.
    fn reply_token(&self) -> Option<&str> {
        self.base().reply_token()
    }

    /// Whether a reply has already been attempted.
    fn has_replied(&self) -> bool {
        self.base().has_replied()
    }

    /// Replies with one or more messages. Plain strings become text messages.
    async fn reply<I>(&self, messages: I) -> ContextResult<()>
    where
        I: IntoIterator + Send,
        I::Item: Into<Message>,
    {
        let messages = messages.into_iter().map(Into::into).collect();
        self.base()
            .send_reply(messages, &ReplyOptions::default())
            .await
    }

    /// Replies with extra options such as quick replies or a custom sender.
    async fn reply_with<I>(&self, messages: I, options: ReplyOptions) -> ContextResult<()>
    where
        I: IntoIterator + Send,
        I::Item: Into<Message>,
    {
        let messages = messages.into_iter().map(Into::into).collect();
        self.base().send_reply(messages, &options).await
    }
}

// ============================================================================
// Context enum
// ============================================================================

macro_rules! define_contexts {
    ($( $variant:ident($ty:ty) => $channel:ident ),* $(,)?) => {
        /// A decoded webhook event.
        ///
        /// Cloning is cheap: every variant holds an `Arc`.
        #[derive(Debug, Clone)]
        pub enum Context {
            $(
                #[doc = concat!("See [`", stringify!($ty), "`].")]
                $variant(Arc<$ty>),
            )*
        }

        impl Context {
            /// Returns the dispatch channel.
            pub fn channel(&self) -> Channel {
                match self {
                    $( Self::$variant(_) => Channel::$channel, )*
                }
            }

            /// Returns the shared part of the context.
            pub fn base(&self) -> &ContextBase {
                match self {
                    $( Self::$variant(context) => &context.base, )*
                }
            }
        }

        $(
            impl EventContext for $ty {
                const CHANNEL: Channel = Channel::$channel;

                fn base(&self) -> &ContextBase {
                    &self.base
                }

                fn extract(context: &Context) -> Option<Arc<Self>> {
                    match context {
                        Context::$variant(inner) => Some(Arc::clone(inner)),
                        _ => None,
                    }
                }

                fn wrap(self: Arc<Self>) -> Context {
                    Context::$variant(self)
                }
            }

            impl Deref for $ty {
                type Target = ContextBase;

                fn deref(&self) -> &ContextBase {
                    &self.base
                }
            }
        )*
    };
}

define_contexts! {
    Text(TextMessageContext) => Text,
    Image(ImageMessageContext) => Image,
    Video(VideoMessageContext) => Video,
    Audio(AudioMessageContext) => Audio,
    File(FileMessageContext) => File,
    Location(LocationMessageContext) => Location,
    Sticker(StickerMessageContext) => Sticker,
    Unsend(UnsendContext) => Unsend,
    Follow(FollowContext) => Follow,
    Unfollow(UnfollowContext) => Unfollow,
    Join(JoinContext) => Join,
    Leave(LeaveContext) => Leave,
    MemberJoin(MemberJoinContext) => MemberJoin,
    MemberLeave(MemberLeaveContext) => MemberLeave,
    Postback(PostbackContext) => Postback,
    VideoViewingComplete(VideoViewingCompleteContext) => VideoComplete,
    Beacon(BeaconContext) => Beacon,
    AccountLink(AccountLinkContext) => AccountLink,
    DeviceLink(DeviceLinkContext) => DeviceLink,
    DeviceUnlink(DeviceUnlinkContext) => DeviceUnlink,
    ThingsScenarioExecution(ThingsScenarioExecutionContext) => ScenarioResult,
}

impl Repliable for TextMessageContext {}
impl Repliable for ImageMessageContext {}
impl Repliable for VideoMessageContext {}
impl Repliable for AudioMessageContext {}
impl Repliable for FileMessageContext {}
impl Repliable for LocationMessageContext {}
impl Repliable for StickerMessageContext {}
impl Repliable for FollowContext {}
impl Repliable for JoinContext {}
impl Repliable for MemberJoinContext {}
impl Repliable for PostbackContext {}
impl Repliable for VideoViewingCompleteContext {}
impl Repliable for BeaconContext {}
impl Repliable for AccountLinkContext {}
impl Repliable for DeviceLinkContext {}
impl Repliable for DeviceUnlinkContext {}
impl Repliable for ThingsScenarioExecutionContext {}

impl Context {
    /// Whether this kind of event can be replied to.
    pub fn is_repliable(&self) -> bool {
        !matches!(
            self,
            Self::Unsend(_) | Self::Unfollow(_) | Self::Leave(_) | Self::MemberLeave(_)
        )
    }

    /// Returns the typed context if it is a `C`.
    pub fn downcast<C: EventContext>(&self) -> Option<Arc<C>> {
        C::extract(self)
    }

    /// Message ID for message events.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Text(c) => Some(&c.message.id),
            Self::Image(c) => Some(&c.message.id),
            Self::Video(c) => Some(&c.message.id),
            Self::Audio(c) => Some(&c.message.id),
            Self::File(c) => Some(&c.message.id),
            Self::Location(c) => Some(&c.message.id),
            Self::Sticker(c) => Some(&c.message.id),
            _ => None,
        }
    }

    /// Replies through whichever variant this is.
    ///
    /// Non-repliable variants fail with
    /// [`CannotReply(MissingToken)`](CannotReplyReason::MissingToken).
    pub async fn reply_with(
        &self,
        messages: Vec<Message>,
        options: ReplyOptions,
    ) -> ContextResult<()> {
        if !self.is_repliable() {
            return Err(ContextError::CannotReply(CannotReplyReason::MissingToken));
        }
        self.base().send_reply(messages, &options).await
    }
}

impl<C: EventContext> From<Arc<C>> for Context {
    fn from(context: Arc<C>) -> Self {
        context.wrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert!("nope".parse::<Channel>().is_err());
    }

    #[test]
    fn test_channel_names_are_unique() {
        let mut names: Vec<_> = Channel::ALL.iter().map(Channel::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Channel::ALL.len());
    }
}
