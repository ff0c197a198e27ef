//! Envelope-level types shared by every event.

use serde::{Deserialize, Serialize};

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Source {
    /// A one-to-one chat.
    User {
        /// The sender's user ID.
        user_id: String,
    },
    /// A group chat.
    Group {
        /// Group ID.
        group_id: String,
        /// The acting user, absent when the user has not consented.
        #[serde(default)]
        user_id: Option<String>,
    },
    /// A multi-person chat.
    Room {
        /// Room ID.
        room_id: String,
        /// The acting user, absent when the user has not consented.
        #[serde(default)]
        user_id: Option<String>,
    },
}

/// Discriminator of a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// One-to-one chat.
    User,
    /// Group chat.
    Group,
    /// Multi-person chat.
    Room,
}

impl SourceType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Room => "room",
        }
    }
}

impl Source {
    /// Returns the source kind.
    pub fn kind(&self) -> SourceType {
        match self {
            Self::User { .. } => SourceType::User,
            Self::Group { .. } => SourceType::Group,
            Self::Room { .. } => SourceType::Room,
        }
    }

    /// Returns the acting user's ID, if known.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { user_id } => Some(user_id),
            Self::Group { user_id, .. } | Self::Room { user_id, .. } => user_id.as_deref(),
        }
    }

    /// Returns the group ID for group sources.
    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Group { group_id, .. } => Some(group_id),
            _ => None,
        }
    }

    /// Returns the room ID for room sources.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::Room { room_id, .. } => Some(room_id),
            _ => None,
        }
    }

    /// Returns the ID a push message to this chat should target.
    pub fn target_id(&self) -> &str {
        match self {
            Self::User { user_id } => user_id,
            Self::Group { group_id, .. } => group_id,
            Self::Room { room_id, .. } => room_id,
        }
    }
}

/// Channel state at the time of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The channel responds to events.
    #[default]
    Active,
    /// Another module holds the chat; the channel should stay silent.
    Standby,
}

/// Delivery metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    /// Whether this is a redelivery of an earlier event.
    pub is_redelivery: bool,
}
