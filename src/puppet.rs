//! Puppet Engine (distilled spec §4.3, §4.5). Grounded on the teacher
//! crate's `bridge::puppet::BridgePuppet` shape (one struct per remote
//! identity, methods that converge HS state towards a desired value) but
//! with every method stateless and idempotent against the HS directly —
//! there is no local puppet table to read first (§3 supplement).

use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::error::Result;
use crate::hs::{MessageContent, PowerLevelsContent};
use crate::ids::{AvatarId, GroupId};

/// Maximum code units a puppet display name is truncated to (distilled
/// spec §4.3 `ensureDisplayName`).
const DISPLAY_NAME_MAX_LEN: usize = 64;

/// `os_<hex>` localpart for a puppet (distilled spec §3).
fn localpart(avatar_id: AvatarId) -> String {
    format!("os_{}", avatar_id.hex_no_dashes())
}

/// Ensures the puppet user exists on the HS. Idempotent via the
/// `M_USER_IN_USE` rule (distilled spec §4.1, §4.3).
pub async fn ensure_user(bridge: &Bridge, avatar_id: AvatarId) -> Result<String> {
    let mxid = avatar_id.puppet_mxid(bridge.homeserver_domain());
    bridge.hs.register_puppet(&localpart(avatar_id)).await?;
    debug!(%mxid, "puppet user ensured");
    Ok(mxid)
}

/// Trims and truncates `name`; returns `None` when the result is empty
/// (distilled spec §4.3 boundary: "whitespace-only is ignored").
fn normalize_display_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let truncated: String = trimmed.chars().take(DISPLAY_NAME_MAX_LEN).collect();
    Some(truncated)
}

/// Sets `mxid`'s display name to `desired` unless it already matches and
/// `force` is false (distilled spec §4.3 `ensureDisplayName`).
pub async fn ensure_display_name(
    bridge: &Bridge,
    mxid: &str,
    desired: &str,
    force: bool,
) -> Result<()> {
    let Some(desired) = normalize_display_name(desired) else {
        return Ok(());
    };

    if !force {
        let profile = bridge.hs.get_profile(mxid).await?;
        if profile.displayname.as_deref() == Some(desired.as_str()) {
            return Ok(());
        }
    }

    bridge.hs.set_display_name_as(mxid, &desired).await?;
    debug!(%mxid, name = %desired, "puppet display name set");
    Ok(())
}

/// Fetches and sets `mxid`'s avatar unless already set and `force` is
/// false, or no avatar template is configured. Any HTTP failure in this
/// path is swallowed (distilled spec §4.3: "avatar absence is not worth
/// failing a message over").
pub async fn ensure_avatar(bridge: &Bridge, mxid: &str, avatar_id: AvatarId, force: bool) {
    let template = bridge.config.avatar.base_url.trim();
    if template.is_empty() {
        return;
    }

    if !force {
        match bridge.hs.get_profile(mxid).await {
            Ok(profile) if profile.avatar_url.as_deref().is_some_and(|u| !u.is_empty()) => {
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%mxid, error = %e, "avatar skip: profile fetch failed");
                return;
            }
        }
    }

    if let Err(e) = fetch_and_set_avatar(bridge, mxid, avatar_id, template).await {
        warn!(%mxid, error = %e, "avatar sync failed, continuing without it");
    }
}

async fn fetch_and_set_avatar(
    bridge: &Bridge,
    mxid: &str,
    avatar_id: AvatarId,
    template: &str,
) -> Result<()> {
    let image_url = template.replace("{uuid}", &avatar_id.to_string());
    let resp = bridge
        .avatar_http
        .get(&image_url)
        .send()
        .await
        .map_err(|e| crate::error::BridgeError::HsApi(format!("avatar fetch: {e}")))?;
    if !crate::hs::is_success(resp.status()) {
        return Err(crate::error::BridgeError::HsApi(format!(
            "avatar fetch {image_url} -> {}",
            resp.status()
        )));
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| crate::error::BridgeError::HsApi(format!("avatar body: {e}")))?;

    let mxc = bridge
        .hs
        .upload_media_as(mxid, bytes.to_vec(), "image/png")
        .await?;
    bridge.hs.set_avatar_url_as(mxid, &mxc).await?;
    debug!(%mxid, %mxc, "puppet avatar set");
    Ok(())
}

/// Invites then joins the puppet into `room` (distilled spec §4.3
/// `ensureJoined`). "Already invited"/"already joined" are treated as
/// success by the HS client itself.
pub async fn ensure_joined(bridge: &Bridge, room: &str, mxid: &str) -> Result<()> {
    bridge.hs.invite(room, mxid).await?;
    bridge.hs.join_as(room, mxid).await?;
    debug!(%mxid, %room, "puppet joined");
    Ok(())
}

/// Power-level computation (distilled spec §4.5 / SPEC_FULL §4.7):
/// `100` iff `2 * powers >= max_powers`, else `0`. Returns `0` when the
/// member has no role row.
pub async fn compute_power_level(
    bridge: &Bridge,
    group_id: GroupId,
    avatar_id: AvatarId,
) -> Result<i64> {
    let Some(powers) = bridge
        .db
        .member_powers(group_id, &avatar_id.to_string())
        .await?
    else {
        return Ok(0);
    };
    let max_powers = bridge.db.max_group_powers(group_id).await?.unwrap_or(1);
    Ok(if powers * 2 >= max_powers {
        crate::config::PowerLevelDefaults::FOUNDER_AND_BOT
    } else {
        0
    })
}

/// Synchronizes `mxid`'s power level in `room` to the computed desired
/// value, unless it already matches and `force` is false (distilled spec
/// §4.3 `syncPowerLevel`). Mutates impersonating the bot — only the bot
/// has authority over `m.room.power_levels`.
pub async fn sync_power_level(
    bridge: &Bridge,
    room: &str,
    mxid: &str,
    group_id: GroupId,
    avatar_id: AvatarId,
    force: bool,
) -> Result<()> {
    let desired = compute_power_level(bridge, group_id, avatar_id).await?;
    let mut pl = bridge.hs.get_power_levels(room).await?;

    if !force && pl.users.get(mxid).copied() == Some(desired) {
        return Ok(());
    }

    pl.users.insert(mxid.to_string(), desired);

    bridge.hs.set_power_levels_as(&bridge.bot_mxid(), room, &pl).await?;
    debug!(%mxid, %room, desired, "puppet power level synced");
    Ok(())
}

/// The full ordered puppet pipeline (distilled spec §5: "the puppet
/// pipeline... is strictly ordered for a single relay call"). Used by
/// both the inbound relay (with `force=false`) and resync (`force=true`).
pub async fn run_pipeline(
    bridge: &Bridge,
    room: &str,
    group_id: GroupId,
    avatar_id: AvatarId,
    display_name: &str,
    force: bool,
) -> Result<String> {
    let mxid = ensure_user(bridge, avatar_id).await?;
    ensure_display_name(bridge, &mxid, display_name, force).await?;
    ensure_avatar(bridge, &mxid, avatar_id, force).await;
    ensure_joined(bridge, room, &mxid).await?;
    sync_power_level(bridge, room, &mxid, group_id, avatar_id, force).await?;
    Ok(mxid)
}

/// Sends a relayed message as `mxid` with a fresh transaction id
/// (distilled spec §4.4 step 4).
pub async fn send_as_puppet(bridge: &Bridge, mxid: &str, room: &str, body: &str) -> Result<()> {
    let txn_id = uuid::Uuid::new_v4().to_string();
    bridge
        .hs
        .send_message_as(mxid, room, &txn_id, &MessageContent::text(body))
        .await
}
