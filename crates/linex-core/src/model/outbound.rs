//! Outbound message payloads.
//!
//! Only the text message is built here; any other message object can be
//! passed through as raw JSON via [`Message::raw`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Matches `[emoji_id](product_id)` markup in outgoing text.
static EMOJI_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+?)\]\(([\w]+?)\)").expect("valid emoji regex"));

/// Placeholder the platform replaces with an emoji.
const EMOJI_PLACEHOLDER: char = '$';

/// One outbound message object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Message(Value);

impl Message {
    /// Creates a text message.
    ///
    /// `[emoji_id](product_id)` markup is turned into `$` placeholders with a
    /// matching `emojis` array.
    pub fn text(text: impl AsRef<str>) -> Self {
        let (text, emojis) = parse_emoji_markup(text.as_ref());

        let mut object = Map::new();
        object.insert("type".into(), Value::from("text"));
        object.insert("text".into(), Value::from(text));
        if !emojis.is_empty() {
            object.insert("emojis".into(), Value::Array(emojis));
        }
        Self(Value::Object(object))
    }

    /// Wraps an already-built message object.
    pub fn raw(value: Value) -> Self {
        Self(value)
    }

    /// Returns the JSON object.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the message, returning the JSON object.
    pub fn into_value(self) -> Value {
        self.0
    }

    fn insert(&mut self, key: &str, value: Value) {
        if let Value::Object(object) = &mut self.0 {
            object.insert(key.to_string(), value);
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self::raw(value)
    }
}

/// Replaces emoji markup with placeholders, collecting the emoji objects.
fn parse_emoji_markup(text: &str) -> (String, Vec<Value>) {
    let mut output = String::with_capacity(text.len());
    let mut emojis = Vec::new();
    let mut last = 0;

    for captures in EMOJI_MARKUP.captures_iter(text) {
        let (Some(whole), Some(emoji_id), Some(product_id)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            continue;
        };

        output.push_str(&text[last..whole.start()]);
        emojis.push(json!({
            "index": output.encode_utf16().count(),
            "productId": product_id.as_str(),
            "emojiId": emoji_id.as_str(),
        }));
        output.push(EMOJI_PLACEHOLDER);
        last = whole.end();
    }
    output.push_str(&text[last..]);

    (output, emojis)
}

// =============================================================================
// Reply Options
// =============================================================================

/// Custom sender shown in place of the bot's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Icon URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Extra settings applied to a reply.
#[derive(Debug, Clone, Default)]
pub struct ReplyOptions {
    /// Deliver without a push notification.
    pub notification_disabled: bool,
    /// Quick reply items attached to the last message.
    pub quick_reply: Vec<Value>,
    /// Sender override attached to the last message.
    pub sender: Option<Sender>,
}

impl ReplyOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables the push notification.
    pub fn silent(mut self) -> Self {
        self.notification_disabled = true;
        self
    }

    /// Adds one quick reply item.
    pub fn quick_reply(mut self, item: Value) -> Self {
        self.quick_reply.push(item);
        self
    }

    /// Sets the sender override.
    pub fn sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Attaches quick replies and sender to the last message.
    pub fn apply(&self, messages: &mut [Message]) {
        let Some(last) = messages.last_mut() else {
            return;
        };
        if !self.quick_reply.is_empty() {
            last.insert("quickReply", json!({ "items": self.quick_reply }));
        }
        if let Some(sender) = &self.sender {
            last.insert("sender", json!(sender));
        }
    }
}
