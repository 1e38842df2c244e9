//! Identifier types for the bridge: 128-bit Sim identifiers and the Matrix
//! identifiers they're projected into. Grounded on the teacher crate's
//! `util::UID` newtype-over-string pattern, generalized to wrap `uuid::Uuid`
//! since Sim identifiers are true UUIDs rather than opaque protocol UINs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The reserved all-zero avatar id. The Sim re-injects bridged messages with
/// this sender to mark them as already-bridged; the relay engine drops them.
pub const ZERO_AVATAR_ID: AvatarId = AvatarId(Uuid::nil());

fn strip_hg_suffix(s: &str) -> &str {
    s.split(';').next().unwrap_or(s)
}

fn hex_no_dashes(id: Uuid) -> String {
    id.simple().to_string()
}

/// A 128-bit Sim avatar identifier, rendered as 36-char hyphenated hex.
/// May be parsed from a home-grid-tagged `<uuid>;<url>` string; the url
/// suffix is stripped and never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvatarId(Uuid);

impl AvatarId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }

    /// The bare hex localpart suffix used in puppet MXIDs: `os_<hex>`.
    pub fn hex_no_dashes(&self) -> String {
        hex_no_dashes(self.0)
    }

    /// Compute the MXID this avatar's puppet is addressed by.
    pub fn puppet_mxid(&self, homeserver_domain: &str) -> String {
        format!("@os_{}:{}", self.hex_no_dashes(), homeserver_domain)
    }
}

impl fmt::Display for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AvatarId {
    type Err = uuid::Error;

    /// Parses a plain UUID, or a home-grid-tagged `<uuid>;<url>` string —
    /// the `;<url>` suffix is stripped before parsing ("strip and keep",
    /// per Design Note 9 of the distilled spec).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(strip_hg_suffix(s.trim())).map(Self)
    }
}

/// A 128-bit Sim group identifier, rendered as 36-char hyphenated hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Uuid);

impl GroupId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn hex_no_dashes(&self) -> String {
        hex_no_dashes(self.0)
    }

    /// The local part of the room alias this group is bridged to:
    /// `os_<first 8 hex chars>`.
    pub fn alias_localpart(&self) -> String {
        format!("os_{}", &self.hex_no_dashes()[..8])
    }

    pub fn alias(&self, homeserver_domain: &str) -> String {
        format!("#{}:{}", self.alias_localpart(), homeserver_domain)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(strip_hg_suffix(s.trim())).map(Self)
    }
}

/// Splits `@localpart:domain` into its parts. Returns `None` if `mxid`
/// doesn't start with `@` or has no `:` separator.
pub fn parse_mxid(mxid: &str) -> Option<(&str, &str)> {
    let rest = mxid.strip_prefix('@')?;
    let (local, domain) = rest.split_once(':')?;
    Some((local, domain))
}

/// True if `mxid`'s localpart is `os_<hex>` (a puppet) or starts with
/// `bot_localpart` (the bridge bot) — used by the HS-side loop guard.
pub fn is_bridge_own_mxid(mxid: &str, bot_localpart: &str) -> bool {
    match parse_mxid(mxid) {
        Some((local, _)) => local.starts_with("os_") || local.starts_with(bot_localpart),
        None => mxid.starts_with("@os_") || mxid.starts_with(&format!("@{bot_localpart}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn puppet_mxid_matches_invariant_1() {
        let id: AvatarId = "22222222-2222-2222-2222-222222222222".parse().unwrap();
        assert_eq!(
            id.puppet_mxid("hs"),
            "@os_22222222222222222222222222222222:hs"
        );
    }

    #[test]
    fn alias_matches_invariant_2() {
        let id: GroupId = "11111111-1111-1111-1111-111111111111".parse().unwrap();
        assert_eq!(id.alias_localpart(), "os_11111111");
        assert_eq!(id.alias("hs"), "#os_11111111:hs");
    }

    #[test]
    fn strips_home_grid_suffix() {
        let id: AvatarId = "33333333-3333-3333-3333-333333333333;https://grid.example/"
            .parse()
            .unwrap();
        assert_eq!(id.to_string(), "33333333-3333-3333-3333-333333333333");
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-uuid".parse::<AvatarId>().is_err());
    }

    #[test]
    fn zero_avatar_id_is_zero() {
        assert!(ZERO_AVATAR_ID.is_zero());
        let parsed: AvatarId = "00000000-0000-0000-0000-000000000000".parse().unwrap();
        assert_eq!(parsed, ZERO_AVATAR_ID);
    }

    #[test]
    fn loop_guard_matches_puppet_and_bot() {
        assert!(is_bridge_own_mxid("@os_deadbeef:hs", "opensim_bot"));
        assert!(is_bridge_own_mxid("@opensim_bot:hs", "opensim_bot"));
        assert!(!is_bridge_own_mxid("@alice:hs", "opensim_bot"));
    }

    #[test]
    fn loop_guard_matches_bot_localpart_prefix() {
        assert!(is_bridge_own_mxid("@opensim_bot_svc:hs", "opensim_bot"));
    }
}
