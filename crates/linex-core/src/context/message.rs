//! Message event contexts.
//!
//! Each context keeps the `message` object of the event as a typed payload
//! and dereferences to [`ContextBase`] for envelope fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::base::ContextBase;
use crate::foundation::ContextResult;
use crate::model::{
    ContentProvider, Emoji, ImageSet, MentionType, Mentionee, MessageContent, fit_emojis,
};

// ============================================================================
// Payloads
// ============================================================================

/// Mention block of a text message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Mentioned targets.
    #[serde(default)]
    pub mentionees: Vec<Mentionee>,
}

/// `message` object of a text message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessage {
    /// Message ID.
    pub id: String,
    /// Message text.
    pub text: String,
    /// LINE emojis in the text.
    #[serde(default)]
    pub emojis: Vec<Emoji>,
    /// Mentions in the text.
    #[serde(default)]
    pub mention: Option<Mention>,
    /// Token for quoting this message.
    #[serde(default)]
    pub quote_token: Option<String>,
}

/// `message` object of an image message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMessage {
    /// Message ID.
    pub id: String,
    /// Where the image is stored.
    pub content_provider: ContentProvider,
    /// Set information when several images were sent at once.
    #[serde(default)]
    pub image_set: Option<ImageSet>,
    /// Token for quoting this message.
    #[serde(default)]
    pub quote_token: Option<String>,
}

/// `message` object of a video message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMessage {
    /// Message ID.
    pub id: String,
    /// Length in milliseconds.
    #[serde(default)]
    pub duration: Option<u64>,
    /// Where the video is stored.
    pub content_provider: ContentProvider,
    /// Token for quoting this message.
    #[serde(default)]
    pub quote_token: Option<String>,
}

/// `message` object of an audio message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMessage {
    /// Message ID.
    pub id: String,
    /// Length in milliseconds.
    #[serde(default)]
    pub duration: Option<u64>,
    /// Where the audio is stored.
    pub content_provider: ContentProvider,
}

/// `message` object of a file message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMessage {
    /// Message ID.
    pub id: String,
    /// File name.
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
}

/// `message` object of a location message event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMessage {
    /// Message ID.
    pub id: String,
    /// Place title.
    #[serde(default)]
    pub title: Option<String>,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// `message` object of a sticker message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerMessage {
    /// Message ID.
    pub id: String,
    /// Sticker package ID.
    pub package_id: String,
    /// Sticker ID.
    pub sticker_id: String,
    /// `STATIC`, `ANIMATION`, `SOUND` and so on.
    pub sticker_resource_type: String,
    /// Keywords describing the sticker.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Text of a message sticker.
    #[serde(default)]
    pub text: Option<String>,
    /// Token for quoting this message.
    #[serde(default)]
    pub quote_token: Option<String>,
}

// ============================================================================
// Contexts
// ============================================================================

/// A text message.
#[derive(Debug)]
pub struct TextMessageContext {
    pub(crate) base: ContextBase,
    /// The message payload.
    pub message: TextMessage,
}

impl TextMessageContext {
    /// Message ID.
    pub fn id(&self) -> &str {
        &self.message.id
    }

    /// Message text.
    pub fn text(&self) -> &str {
        &self.message.text
    }

    /// LINE emojis in the text.
    pub fn emojis(&self) -> &[Emoji] {
        &self.message.emojis
    }

    /// Mentions in the text.
    pub fn mentions(&self) -> &[Mentionee] {
        self.message
            .mention
            .as_ref()
            .map(|m| m.mentionees.as_slice())
            .unwrap_or_default()
    }

    /// Text with emoji placeholders rewritten as `[emoji_id](product_id)`.
    pub fn text_with_emojis(&self) -> String {
        fit_emojis(&self.message.text, &self.message.emojis)
    }

    /// Whether `user_id` is mentioned, either directly or by an `@All`.
    pub fn mentioned(&self, user_id: &str) -> bool {
        self.mentions().iter().any(|m| match m.kind {
            MentionType::All => true,
            MentionType::User => m.user_id.as_deref() == Some(user_id),
        })
    }
}

/// An image message.
#[derive(Debug)]
pub struct ImageMessageContext {
    pub(crate) base: ContextBase,
    /// The message payload.
    pub message: ImageMessage,
}

/// A video message.
#[derive(Debug)]
pub struct VideoMessageContext {
    pub(crate) base: ContextBase,
    /// The message payload.
    pub message: VideoMessage,
}

/// An audio message.
#[derive(Debug)]
pub struct AudioMessageContext {
    pub(crate) base: ContextBase,
    /// The message payload.
    pub message: AudioMessage,
}

/// A file message.
#[derive(Debug)]
pub struct FileMessageContext {
    pub(crate) base: ContextBase,
    /// The message payload.
    pub message: FileMessage,
}

/// A location message.
#[derive(Debug)]
pub struct LocationMessageContext {
    pub(crate) base: ContextBase,
    /// The message payload.
    pub message: LocationMessage,
}

impl LocationMessageContext {
    /// Message ID.
    pub fn id(&self) -> &str {
        &self.message.id
    }

    /// Place title.
    pub fn title(&self) -> Option<&str> {
        self.message.title.as_deref()
    }

    /// Street address.
    pub fn address(&self) -> Option<&str> {
        self.message.address.as_deref()
    }

    pub fn latitude(&self) -> f64 {
        self.message.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.message.longitude
    }

    /// Google Maps link centred on the shared location.
    pub fn google_maps_url(&self) -> String {
        format!(
            "http://maps.google.com/maps?z=12&t=m&q=loc:{}+{}",
            self.message.latitude, self.message.longitude
        )
    }
}

/// A sticker message.
#[derive(Debug)]
pub struct StickerMessageContext {
    pub(crate) base: ContextBase,
    /// The message payload.
    pub message: StickerMessage,
}

impl StickerMessageContext {
    /// Message ID.
    pub fn id(&self) -> &str {
        &self.message.id
    }

    pub fn package_id(&self) -> &str {
        &self.message.package_id
    }

    pub fn sticker_id(&self) -> &str {
        &self.message.sticker_id
    }

    /// `STATIC`, `ANIMATION`, `SOUND` and so on.
    pub fn resource_type(&self) -> &str {
        &self.message.sticker_resource_type
    }

    pub fn keywords(&self) -> &[String] {
        &self.message.keywords
    }

    /// Text of a message sticker.
    pub fn text(&self) -> Option<&str> {
        self.message.text.as_deref()
    }
}

impl ImageMessageContext {
    /// Where the image is stored.
    pub fn content_provider(&self) -> &ContentProvider {
        &self.message.content_provider
    }

    /// Set information when several images were sent at once.
    pub fn image_set(&self) -> Option<&ImageSet> {
        self.message.image_set.as_ref()
    }
}

impl VideoMessageContext {
    /// Where the video is stored.
    pub fn content_provider(&self) -> &ContentProvider {
        &self.message.content_provider
    }

    /// Length in milliseconds.
    pub fn duration(&self) -> Option<u64> {
        self.message.duration
    }
}

impl AudioMessageContext {
    /// Where the audio is stored.
    pub fn content_provider(&self) -> &ContentProvider {
        &self.message.content_provider
    }

    /// Length in milliseconds.
    pub fn duration(&self) -> Option<u64> {
        self.message.duration
    }
}

impl FileMessageContext {
    pub fn file_name(&self) -> &str {
        &self.message.file_name
    }

    /// Size in bytes.
    pub fn file_size(&self) -> u64 {
        self.message.file_size
    }
}

/// Generates `content()` and `save()` for contexts carrying downloadable media.
macro_rules! impl_downloadable {
    ($ty:ty, |$msg:ident| $provider:expr) => {
        impl $ty {
            /// Message ID.
            pub fn id(&self) -> &str {
                &self.message.id
            }

            /// Downloads the message content.
            pub async fn content(&self) -> ContextResult<MessageContent> {
                let $msg = &self.message;
                self.base.download(&$msg.id, $provider).await
            }

            /// Downloads the message content and writes it to `path`.
            pub async fn save(&self, path: impl AsRef<Path>) -> ContextResult<MessageContent> {
                let content = self.content().await?;
                tokio::fs::write(path, &content.bytes).await?;
                Ok(content)
            }
        }
    };
}

impl_downloadable!(ImageMessageContext, |m| Some(&m.content_provider));
impl_downloadable!(VideoMessageContext, |m| Some(&m.content_provider));
impl_downloadable!(AudioMessageContext, |m| Some(&m.content_provider));
impl_downloadable!(FileMessageContext, |m| None);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_payload_defaults() {
        let message: TextMessage =
            serde_json::from_value(json!({ "id": "1", "text": "hi" })).unwrap();

        assert!(message.emojis.is_empty());
        assert!(message.mention.is_none());
    }

    #[test]
    fn test_sticker_requires_resource_type() {
        let result: Result<StickerMessage, _> = serde_json::from_value(json!({
            "id": "1",
            "packageId": "446",
            "stickerId": "1988"
        }));
        assert!(result.is_err());
    }
}
