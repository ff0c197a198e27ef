//! Webhook event decoding.
//!
//! Decoding is a two-step classification followed by construction:
//!
//! 1. [`classify`] reads `type` (and `message.type` or `things.type` where
//!    the top-level type is not specific enough) and picks a [`Channel`].
//! 2. [`decode`] builds the matching [`Context`] variant with an exhaustive
//!    `match` on that channel, parsing only the payload section the variant
//!    needs.
//!
//! Message contexts are written to the entity cache under their message ID.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::base::{ContextBase, ContextDeps, EventMeta};
use super::{Channel, Context, event::*, message::*};
use crate::foundation::{DecodeError, DecodeResult};
use crate::model::{DeliveryContext, Mode, Source};

/// Envelope fields present on every event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    mode: Mode,
    timestamp: i64,
    #[serde(default)]
    webhook_event_id: String,
    #[serde(default)]
    delivery_context: DeliveryContext,
    #[serde(default)]
    reply_token: Option<String>,
    source: Source,
}

/// Picks the channel an event belongs to, without constructing anything.
pub fn classify(event: &Value) -> DecodeResult<Channel> {
    let kind = event
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::malformed("missing event type"))?;

    let channel = match kind {
        "message" => match nested_type(event, "message")? {
            "text" => Channel::Text,
            "image" => Channel::Image,
            "video" => Channel::Video,
            "audio" => Channel::Audio,
            "file" => Channel::File,
            "location" => Channel::Location,
            "sticker" => Channel::Sticker,
            other => return Err(DecodeError::UnknownEventType(format!("message/{other}"))),
        },
        "unsend" => Channel::Unsend,
        "follow" => Channel::Follow,
        "unfollow" => Channel::Unfollow,
        "join" => Channel::Join,
        "leave" => Channel::Leave,
        "memberJoined" => Channel::MemberJoin,
        "memberLeft" => Channel::MemberLeave,
        "postback" => Channel::Postback,
        "videoPlayComplete" => Channel::VideoComplete,
        "beacon" => Channel::Beacon,
        "accountLink" => Channel::AccountLink,
        "things" => match nested_type(event, "things")? {
            "link" => Channel::DeviceLink,
            "unlink" => Channel::DeviceUnlink,
            "scenarioResult" => Channel::ScenarioResult,
            other => return Err(DecodeError::UnknownEventType(format!("things/{other}"))),
        },
        other => return Err(DecodeError::UnknownEventType(other.to_string())),
    };
    Ok(channel)
}

/// Decodes one element of a webhook `events` array.
pub fn decode(event: &Value, deps: &ContextDeps) -> DecodeResult<Context> {
    let channel = classify(event)?;
    let envelope = Envelope::deserialize(event)?;

    let meta = EventMeta {
        kind: envelope.kind,
        event_id: envelope.webhook_event_id,
        is_redelivery: envelope.delivery_context.is_redelivery,
        timestamp: envelope.timestamp,
        source: envelope.source,
        mode: envelope.mode,
        reply_token: envelope.reply_token,
    };
    let base = ContextBase::new(meta, deps.clone());

    let context = match channel {
        Channel::Text => Context::Text(Arc::new(TextMessageContext {
            base,
            message: field(event, "message")?,
        })),
        Channel::Image => Context::Image(Arc::new(ImageMessageContext {
            base,
            message: field(event, "message")?,
        })),
        Channel::Video => Context::Video(Arc::new(VideoMessageContext {
            base,
            message: field(event, "message")?,
        })),
        Channel::Audio => Context::Audio(Arc::new(AudioMessageContext {
            base,
            message: field(event, "message")?,
        })),
        Channel::File => Context::File(Arc::new(FileMessageContext {
            base,
            message: field(event, "message")?,
        })),
        Channel::Location => Context::Location(Arc::new(LocationMessageContext {
            base,
            message: field(event, "message")?,
        })),
        Channel::Sticker => Context::Sticker(Arc::new(StickerMessageContext {
            base,
            message: field(event, "message")?,
        })),
        Channel::Unsend => Context::Unsend(Arc::new(UnsendContext {
            base,
            unsend: field(event, "unsend")?,
        })),
        Channel::Follow => Context::Follow(Arc::new(FollowContext {
            base,
            follow: optional_field(event, "follow")?.unwrap_or_default(),
        })),
        Channel::Unfollow => Context::Unfollow(Arc::new(UnfollowContext { base })),
        Channel::Join => Context::Join(Arc::new(JoinContext { base })),
        Channel::Leave => Context::Leave(Arc::new(LeaveContext { base })),
        Channel::MemberJoin => Context::MemberJoin(Arc::new(MemberJoinContext {
            base,
            joined: field(event, "joined")?,
        })),
        Channel::MemberLeave => Context::MemberLeave(Arc::new(MemberLeaveContext {
            base,
            left: field(event, "left")?,
        })),
        Channel::Postback => Context::Postback(Arc::new(PostbackContext {
            base,
            postback: field(event, "postback")?,
        })),
        Channel::VideoComplete => {
            Context::VideoViewingComplete(Arc::new(VideoViewingCompleteContext {
                base,
                video_play_complete: field(event, "videoPlayComplete")?,
            }))
        }
        Channel::Beacon => Context::Beacon(Arc::new(BeaconContext {
            base,
            beacon: field(event, "beacon")?,
        })),
        Channel::AccountLink => Context::AccountLink(Arc::new(AccountLinkContext {
            base,
            link: field(event, "link")?,
        })),
        Channel::DeviceLink => Context::DeviceLink(Arc::new(DeviceLinkContext {
            base,
            things: field(event, "things")?,
        })),
        Channel::DeviceUnlink => Context::DeviceUnlink(Arc::new(DeviceUnlinkContext {
            base,
            things: field(event, "things")?,
        })),
        Channel::ScenarioResult => {
            Context::ThingsScenarioExecution(Arc::new(ThingsScenarioExecutionContext {
                base,
                things: field(event, "things")?,
            }))
        }
    };

    if let Some(message_id) = context.message_id() {
        deps.cache
            .insert_message(message_id.to_string(), context.clone());
    }
    Ok(context)
}

fn nested_type<'a>(event: &'a Value, key: &str) -> DecodeResult<&'a str> {
    event
        .get(key)
        .and_then(|section| section.get("type"))
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::malformed(format!("missing {key}.type")))
}

fn field<T: DeserializeOwned>(event: &Value, key: &str) -> DecodeResult<T> {
    let section = event
        .get(key)
        .ok_or_else(|| DecodeError::malformed(format!("missing `{key}`")))?;
    T::deserialize(section).map_err(|e| DecodeError::malformed(format!("`{key}`: {e}")))
}

fn optional_field<T: DeserializeOwned>(event: &Value, key: &str) -> DecodeResult<Option<T>> {
    match event.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => field(event, key).map(Some),
    }
}
