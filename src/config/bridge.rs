//! Bot identity and power-level scaffold constants, grounded on the
//! teacher crate's `config::bridge` (its `BridgeConfig`/`BotConfig` split
//! and `NAME_QUALITY_*` constant pattern), trimmed to what the distilled
//! spec actually needs.

use serde::Deserialize;

/// Default power-level scaffold applied to every room this bridge creates
/// or synchronizes (distilled spec §3, invariant 2).
pub struct PowerLevelDefaults;

impl PowerLevelDefaults {
    pub const STATE_DEFAULT: i64 = 50;
    pub const USERS_DEFAULT: i64 = 0;
    pub const EVENTS_DEFAULT: i64 = 0;
    pub const INVITE: i64 = 50;
    pub const KICK: i64 = 50;
    pub const BAN: i64 = 75;
    pub const REDACT: i64 = 50;
    pub const FOUNDER_AND_BOT: i64 = 100;
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub localpart: String,
    #[serde(default = "default_bot_displayname")]
    pub displayname: String,
}

fn default_bot_displayname() -> String {
    "Lighthouse Bridge".to_string()
}

impl BotConfig {
    pub fn mxid(&self, domain: &str) -> String {
        format!("@{}:{}", self.localpart, domain)
    }
}
