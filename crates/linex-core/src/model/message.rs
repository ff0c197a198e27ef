//! Pieces of inbound message payloads.

use serde::{Deserialize, Serialize};

/// A LINE emoji embedded in a text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emoji {
    /// Position of the emoji in the text, in UTF-16 code units.
    pub index: usize,
    /// Length of the emoji's placeholder in the text.
    #[serde(default)]
    pub length: usize,
    /// Product ID of the emoji set.
    pub product_id: String,
    /// Emoji ID within the set.
    pub emoji_id: String,
}

/// Who a mention refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionType {
    /// A single user.
    User,
    /// Everyone in the chat.
    All,
}

/// One mention inside a text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mentionee {
    /// Position of the mention in the text.
    pub index: usize,
    /// Length of the mention text.
    pub length: usize,
    /// Mention type.
    #[serde(rename = "type")]
    pub kind: MentionType,
    /// Mentioned user, for user mentions with consent.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Whether the mention targets the bot itself.
    #[serde(default)]
    pub is_self: bool,
}

/// Where the binary content of a media message lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentProvider {
    /// `line` or `external`.
    #[serde(rename = "type")]
    pub kind: ProviderType,
    /// Original content URL for external providers.
    #[serde(default)]
    pub original_content_url: Option<String>,
    /// Preview image URL for external providers.
    #[serde(default)]
    pub preview_image_url: Option<String>,
}

/// Content provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Content is stored by the platform.
    Line,
    /// Content is hosted by a third party.
    External,
}

/// Grouping information for images sent together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSet {
    /// Set ID.
    pub id: String,
    /// 1-based position within the set.
    #[serde(default)]
    pub index: Option<u32>,
    /// Number of images in the set.
    #[serde(default)]
    pub total: Option<u32>,
}

/// Rewrites emoji placeholders as `[emoji_id](product_id)` markup.
///
/// Spans that fall outside the text are left untouched.
pub fn fit_emojis(text: &str, emojis: &[Emoji]) -> String {
    let mut sorted: Vec<&Emoji> = emojis.iter().collect();
    sorted.sort_by(|a, b| b.index.cmp(&a.index));

    let mut output = text.to_string();
    for emoji in sorted {
        let Some(end) = emoji.index.checked_add(emoji.length) else {
            continue;
        };
        let (Some(start), Some(end)) = (
            utf16_to_byte(&output, emoji.index),
            utf16_to_byte(&output, end),
        ) else {
            continue;
        };
        let markup = format!("[{}]({})", emoji.emoji_id, emoji.product_id);
        output.replace_range(start..end, &markup);
    }
    output
}

/// Converts a UTF-16 offset into a byte offset of `text`.
pub(crate) fn utf16_to_byte(text: &str, offset: usize) -> Option<usize> {
    let mut units = 0;
    for (byte, ch) in text.char_indices() {
        if units == offset {
            return Some(byte);
        }
        if units > offset {
            return None;
        }
        units += ch.len_utf16();
    }
    (units == offset).then_some(text.len())
}
