//! Non-message event contexts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::ContextBase;
use crate::model::Source;

// ============================================================================
// Payloads
// ============================================================================

/// `unsend` object of an unsend event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unsend {
    /// ID of the message that was taken back.
    pub message_id: String,
}

/// `follow` object of a follow event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    /// Whether the user unblocked the account rather than adding it.
    #[serde(default)]
    pub is_unblocked: bool,
}

/// `joined` / `left` object of member events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    /// The users who joined or left.
    pub members: Vec<Source>,
}

/// `postback` object of a postback event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Postback {
    /// Postback data set on the action.
    pub data: String,
    /// Values chosen in pickers or rich menu switches.
    #[serde(default)]
    pub params: Option<PostbackParams>,
}

/// Parameters attached to a postback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackParams {
    /// Picked date and time, for `datetime` pickers.
    #[serde(default)]
    pub datetime: Option<String>,
    /// Picked date, for `date` pickers.
    #[serde(default)]
    pub date: Option<String>,
    /// Picked time, for `time` pickers.
    #[serde(default)]
    pub time: Option<String>,
    /// Target alias of a rich menu switch action.
    #[serde(default)]
    pub new_rich_menu_alias_id: Option<String>,
    /// Outcome of a rich menu switch action.
    #[serde(default)]
    pub status: Option<String>,
}

/// `videoPlayComplete` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPlayComplete {
    /// Tracking ID set on the video message.
    pub tracking_id: String,
}

/// What a beacon event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeaconType {
    /// The user entered the beacon's range.
    Enter,
    /// The user tapped a beacon banner.
    Banner,
    /// The user is staying in range.
    Stay,
}

/// `beacon` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    /// Hardware ID of the beacon.
    pub hwid: String,
    /// Beacon event type.
    #[serde(rename = "type")]
    pub kind: BeaconType,
    /// Device message, hex-encoded.
    #[serde(default)]
    pub dm: Option<String>,
}

/// Whether an account link succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkResult {
    /// Linking succeeded.
    Ok,
    /// Linking failed.
    Failed,
}

/// `link` object of an account link event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    /// Link result.
    pub result: LinkResult,
    /// Nonce generated when the link was requested.
    pub nonce: String,
}

/// `things` object of device link and unlink events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Things {
    /// Device ID.
    pub device_id: String,
}

/// Outcome of an automatically executed scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    /// Scenario ID.
    pub scenario_id: String,
    /// Scenario set revision.
    pub revision: i64,
    /// Execution start, in milliseconds since the epoch.
    pub start_time: i64,
    /// Execution end, in milliseconds since the epoch.
    pub end_time: i64,
    /// `success`, `gatt_error` and so on.
    pub result_code: String,
    /// Results of each action, as sent by the platform.
    #[serde(default)]
    pub action_results: Vec<Value>,
    /// Notification payload, base64-encoded.
    #[serde(default)]
    pub ble_notification_payload: Option<String>,
    /// Error text when the scenario failed.
    #[serde(default)]
    pub error_reason: Option<String>,
}

/// `things` object of a scenario result event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThingsScenario {
    /// Device ID.
    pub device_id: String,
    /// Execution result.
    pub result: ScenarioResult,
}

// ============================================================================
// Contexts
// ============================================================================

/// A message was taken back by its sender.
#[derive(Debug)]
pub struct UnsendContext {
    pub(crate) base: ContextBase,
    /// The unsend payload.
    pub unsend: Unsend,
}

impl UnsendContext {
    /// ID of the message that was taken back.
    pub fn message_id(&self) -> &str {
        &self.unsend.message_id
    }
}

/// The account was added as a friend or unblocked.
#[derive(Debug)]
pub struct FollowContext {
    pub(crate) base: ContextBase,
    /// The follow payload.
    pub follow: Follow,
}

/// The account was blocked.
#[derive(Debug)]
pub struct UnfollowContext {
    pub(crate) base: ContextBase,
}

/// The bot joined a group or room.
#[derive(Debug)]
pub struct JoinContext {
    pub(crate) base: ContextBase,
}

/// The bot was removed from a group or room.
#[derive(Debug)]
pub struct LeaveContext {
    pub(crate) base: ContextBase,
}

/// Users joined a group or room the bot is in.
#[derive(Debug)]
pub struct MemberJoinContext {
    pub(crate) base: ContextBase,
    /// The users who joined.
    pub joined: Members,
}

impl MemberJoinContext {
    /// The users who joined.
    pub fn members(&self) -> &[Source] {
        &self.joined.members
    }
}

/// Users left a group or room the bot is in.
#[derive(Debug)]
pub struct MemberLeaveContext {
    pub(crate) base: ContextBase,
    /// The users who left.
    pub left: Members,
}

impl MemberLeaveContext {
    /// The users who left.
    pub fn members(&self) -> &[Source] {
        &self.left.members
    }
}

/// A postback action was triggered.
#[derive(Debug)]
pub struct PostbackContext {
    pub(crate) base: ContextBase,
    /// The postback payload.
    pub postback: Postback,
}

impl PostbackContext {
    /// Postback data.
    pub fn data(&self) -> &str {
        &self.postback.data
    }

    /// Picked date and time, for `datetime` pickers.
    pub fn datetime(&self) -> Option<&str> {
        self.postback.params.as_ref()?.datetime.as_deref()
    }

    /// Picked date, for `date` pickers.
    pub fn date(&self) -> Option<&str> {
        self.postback.params.as_ref()?.date.as_deref()
    }

    /// Picked time, for `time` pickers.
    pub fn time(&self) -> Option<&str> {
        self.postback.params.as_ref()?.time.as_deref()
    }

    /// Target alias of a rich menu switch action.
    pub fn new_rich_menu_alias_id(&self) -> Option<&str> {
        self.postback.params.as_ref()?.new_rich_menu_alias_id.as_deref()
    }
}

/// A user finished watching a tracked video.
#[derive(Debug)]
pub struct VideoViewingCompleteContext {
    pub(crate) base: ContextBase,
    /// The video payload.
    pub video_play_complete: VideoPlayComplete,
}

impl VideoViewingCompleteContext {
    /// Tracking ID set on the video message.
    pub fn tracking_id(&self) -> &str {
        &self.video_play_complete.tracking_id
    }
}

/// A user came near a beacon.
#[derive(Debug)]
pub struct BeaconContext {
    pub(crate) base: ContextBase,
    /// The beacon payload.
    pub beacon: Beacon,
}

impl BeaconContext {
    /// Hardware ID of the beacon.
    pub fn hwid(&self) -> &str {
        &self.beacon.hwid
    }

    /// Beacon event type.
    pub fn kind(&self) -> BeaconType {
        self.beacon.kind
    }

    /// Device message, hex-encoded.
    pub fn dm(&self) -> Option<&str> {
        self.beacon.dm.as_deref()
    }
}

/// A user linked their account.
#[derive(Debug)]
pub struct AccountLinkContext {
    pub(crate) base: ContextBase,
    /// The link payload.
    pub link: AccountLink,
}

impl AccountLinkContext {
    /// Link result.
    pub fn result(&self) -> LinkResult {
        self.link.result
    }

    /// Nonce generated when the link was requested.
    pub fn nonce(&self) -> &str {
        &self.link.nonce
    }
}

/// A user linked a LINE Things device.
#[derive(Debug)]
pub struct DeviceLinkContext {
    pub(crate) base: ContextBase,
    /// The device payload.
    pub things: Things,
}

impl DeviceLinkContext {
    /// Device ID.
    pub fn device_id(&self) -> &str {
        &self.things.device_id
    }
}

/// A user unlinked a LINE Things device.
#[derive(Debug)]
pub struct DeviceUnlinkContext {
    pub(crate) base: ContextBase,
    /// The device payload.
    pub things: Things,
}

impl DeviceUnlinkContext {
    /// Device ID.
    pub fn device_id(&self) -> &str {
        &self.things.device_id
    }
}

/// A LINE Things automatic scenario finished.
#[derive(Debug)]
pub struct ThingsScenarioExecutionContext {
    pub(crate) base: ContextBase,
    /// The scenario payload.
    pub things: ThingsScenario,
}

impl ThingsScenarioExecutionContext {
    /// Device ID.
    pub fn device_id(&self) -> &str {
        &self.things.device_id
    }

    /// Execution result.
    pub fn result(&self) -> &ScenarioResult {
        &self.things.result
    }
}
