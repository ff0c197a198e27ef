//! Wire data models.
//!
//! - [`entity`]: users, groups and other API resources
//! - [`source`]: envelope fields shared by all events
//! - [`message`]: inbound message fragments (emojis, mentions, content providers)
//! - [`outbound`]: reply payloads

pub mod entity;
pub mod message;
pub mod outbound;
pub mod source;

pub use entity::{BotUser, Group, MessageContent, User, WebhookEndpoint, WebhookTest};
pub use message::{
    ContentProvider, Emoji, ImageSet, MentionType, Mentionee, ProviderType, fit_emojis,
};
pub use outbound::{Message, ReplyOptions, Sender};
pub use source::{DeliveryContext, Mode, Source, SourceType};
