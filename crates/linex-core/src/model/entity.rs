//! Platform entities fetched through the API and kept in the entity cache.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub user_id: String,
    /// Display name.
    pub display_name: String,
    /// Language tag; the platform omits it when unknown.
    #[serde(default = "default_language")]
    pub language: String,
    /// Profile picture URL.
    #[serde(default)]
    pub picture_url: Option<String>,
    /// Status message.
    #[serde(default)]
    pub status_message: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

/// The bot's own account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotUser {
    /// The bot's user ID.
    pub user_id: String,
    /// Basic ID, e.g. `@123abcde`.
    pub basic_id: String,
    /// Premium ID, when one is set.
    #[serde(default)]
    pub premium_id: Option<String>,
    /// Display name.
    pub display_name: String,
    /// Profile picture URL.
    #[serde(default)]
    pub picture_url: Option<String>,
    /// `chat` or `bot`.
    pub chat_mode: String,
    /// `auto` or `manual`.
    pub mark_as_read_mode: String,
}

impl BotUser {
    /// URL of the Official Account Manager response settings page.
    pub fn response_settings_url(&self) -> String {
        format!(
            "https://manager.line.biz/account/{}/setting/response",
            self.basic_id
        )
    }
}

/// A group chat summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group ID.
    pub group_id: String,
    /// Group name.
    pub group_name: String,
    /// Group icon URL.
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// The channel's configured webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEndpoint {
    /// Endpoint URL.
    pub endpoint: String,
    /// Whether webhook delivery is enabled.
    pub active: bool,
}

/// Result of asking the platform to send a test delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTest {
    /// Whether the endpoint answered with 200.
    pub success: bool,
    /// When the test was performed.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Status code returned by the endpoint.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Short reason text.
    #[serde(default)]
    pub reason: String,
    /// Details of the response.
    #[serde(default)]
    pub detail: String,
}

/// Binary content of a media or file message.
#[derive(Debug, Clone)]
pub struct MessageContent {
    /// Raw bytes.
    pub bytes: Bytes,
    /// `Content-Type` reported by the server.
    pub content_type: Option<String>,
}
