//! Wire types for the homeserver Client-Server/AppService API, trimmed
//! from the teacher crate's `matrix::types` to what the HS Client (§4.1)
//! and Relay/Admin engines (§4.6, §4.8) actually exchange.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub unsigned: Option<UnsignedData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnsignedData {
    #[serde(default)]
    pub sender_display_name: Option<String>,
}

/// Body of `PUT /_matrix/app/v1/transactions/{txnId}` (distilled spec §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub events: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageContent {
    pub msgtype: String,
    pub body: String,
}

impl MessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            msgtype: "m.text".to_string(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomRequest {
    pub visibility: String,
    pub room_alias_name: String,
    pub name: String,
    pub topic: String,
    pub preset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomAliasLookup {
    pub room_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileResponse {
    pub displayname: Option<String>,
    pub avatar_url: Option<String>,
}

/// `m.room.power_levels` state content (distilled spec §3 invariant 2).
/// Unknown/extra fields round-trip through `extra` so a read-modify-write
/// never drops state this crate doesn't model (e.g. `events`, `notifications`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerLevelsContent {
    #[serde(default)]
    pub users: HashMap<String, i64>,
    #[serde(default = "PowerLevelsContent::default_users_default")]
    pub users_default: i64,
    #[serde(default = "PowerLevelsContent::default_events_default")]
    pub events_default: i64,
    #[serde(default = "PowerLevelsContent::default_state_default")]
    pub state_default: i64,
    #[serde(default = "PowerLevelsContent::default_invite")]
    pub invite: i64,
    #[serde(default = "PowerLevelsContent::default_kick")]
    pub kick: i64,
    #[serde(default = "PowerLevelsContent::default_ban")]
    pub ban: i64,
    #[serde(default = "PowerLevelsContent::default_redact")]
    pub redact: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PowerLevelsContent {
    fn default_users_default() -> i64 {
        crate::config::PowerLevelDefaults::USERS_DEFAULT
    }
    fn default_events_default() -> i64 {
        crate::config::PowerLevelDefaults::EVENTS_DEFAULT
    }
    fn default_state_default() -> i64 {
        crate::config::PowerLevelDefaults::STATE_DEFAULT
    }
    fn default_invite() -> i64 {
        crate::config::PowerLevelDefaults::INVITE
    }
    fn default_kick() -> i64 {
        crate::config::PowerLevelDefaults::KICK
    }
    fn default_ban() -> i64 {
        crate::config::PowerLevelDefaults::BAN
    }
    fn default_redact() -> i64 {
        crate::config::PowerLevelDefaults::REDACT
    }

    /// The default scaffold applied to every room this bridge creates
    /// (distilled spec §3 invariant 2), before `users` is populated.
    pub fn scaffold() -> Self {
        Self {
            users: HashMap::new(),
            users_default: Self::default_users_default(),
            events_default: Self::default_events_default(),
            state_default: Self::default_state_default(),
            invite: Self::default_invite(),
            kick: Self::default_kick(),
            ban: Self::default_ban(),
            redact: Self::default_redact(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaUploadResponse {
    pub content_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub errcode: String,
    #[serde(default)]
    pub error: String,
}

/// HS error codes treated as success by the idempotency rules in
/// distilled spec §4.1.
pub const M_USER_IN_USE: &str = "M_USER_IN_USE";
pub const M_ALREADY_JOINED: &str = "M_ALREADY_JOINED";
