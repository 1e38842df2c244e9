//! Bridge Admin (distilled spec §4.6, SPEC_FULL §4.8). Grounded on the
//! teacher crate's admin-flavored bridge setup flow, reworked around the
//! distilled spec's explicit enable/resync contract instead of the
//! teacher's login-command flow.

use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::config::PowerLevelDefaults;
use crate::database::GroupBridgeRow;
use crate::error::{BridgeError, Result};
use crate::hs::{CreateRoomRequest, PowerLevelsContent};
use crate::ids::{AvatarId, GroupId};
use crate::metrics::METRICS;
use crate::puppet;

/// Enables a group's bridge, idempotently (distilled spec §4.6
/// `enableBridge`).
pub async fn enable_bridge(
    bridge: &Bridge,
    group_id: GroupId,
    group_name: &str,
    founder: AvatarId,
) -> Result<String> {
    if let Some(existing) = bridge.db.get_enabled_bridge(group_id).await? {
        if let Some(room_id) = existing.room_id {
            info!(%group_id, %room_id, "bridge already enabled");
            return Ok(room_id);
        }
    }

    let alias = group_id.alias(bridge.homeserver_domain());
    if let Some(room_id) = bridge.hs.lookup_room_by_alias(&alias).await? {
        info!(%group_id, %alias, %room_id, "adopting existing aliased room");
        let row = GroupBridgeRow::new(group_id, room_id.clone(), founder.to_string());
        bridge.db.upsert_group_bridge(row).await?;
        return Ok(room_id);
    }

    let room_id = create_bridged_room(bridge, group_id, group_name).await?;

    let founder_mxid = puppet::ensure_user(bridge, founder).await?;
    puppet::ensure_joined(bridge, &room_id, &founder_mxid).await?;

    let mut pl = PowerLevelsContent::scaffold();
    pl.users
        .insert(bridge.bot_mxid(), PowerLevelDefaults::FOUNDER_AND_BOT);
    pl.users
        .insert(founder_mxid.clone(), PowerLevelDefaults::FOUNDER_AND_BOT);
    bridge.hs.set_power_levels_as(&bridge.bot_mxid(), &room_id, &pl).await?;

    let row = GroupBridgeRow::new(group_id, room_id.clone(), founder.to_string());
    bridge.db.upsert_group_bridge(row).await?;

    METRICS.inc_bridges_enabled();
    info!(%group_id, %room_id, founder = %founder_mxid, "bridge enabled");
    Ok(room_id)
}

async fn create_bridged_room(bridge: &Bridge, group_id: GroupId, group_name: &str) -> Result<String> {
    let spec = CreateRoomRequest {
        visibility: "private".to_string(),
        room_alias_name: group_id.alias_localpart(),
        name: format!("OpenSim | {group_name}"),
        topic: format!("OpenSim group {group_id}"),
        preset: "private_chat".to_string(),
    };
    bridge.hs.create_room(&spec).await
}

/// Re-syncs every member of `group_id` against the HS with `force=true`
/// (distilled spec §4.6 `resyncGroup`). Requires an enabled row; fails
/// with `NOT_ENABLED` if absent. Per-member failures are logged and
/// skipped rather than aborting the batch.
pub async fn resync_group(bridge: &Bridge, group_id: GroupId) -> Result<usize> {
    let row = bridge
        .db
        .get_enabled_bridge(group_id)
        .await?
        .ok_or_else(|| BridgeError::NotEnabled(group_id.to_string()))?;
    let room_id = row
        .room_id
        .ok_or_else(|| BridgeError::NotEnabled(group_id.to_string()))?;

    let principals = bridge.db.group_principals(group_id).await?;
    let mut synced = 0usize;

    for principal in principals {
        let avatar_id: AvatarId = match principal.parse() {
            Ok(id) => id,
            Err(_) => {
                warn!(%principal, "skipping resync: invalid principal id");
                continue;
            }
        };

        // Bulk resync has no profile-name source (Open Question, distilled
        // spec §9): fall back to the stable avatar id string.
        let display_name = avatar_id.to_string();
        match puppet::run_pipeline(
            bridge,
            &room_id,
            group_id,
            avatar_id,
            &display_name,
            true,
        )
        .await
        {
            Ok(_) => synced += 1,
            Err(e) => warn!(%group_id, %avatar_id, error = %e, "resync failed for member"),
        }
    }

    METRICS.inc_resync_runs();
    info!(%group_id, synced, "resync complete");
    Ok(synced)
}

/// `GET /admin/bridge/list` backing method (SPEC_FULL §4.8 supplement,
/// grounded on original_source/bridge/app.py's direct store query).
pub async fn list_enabled(bridge: &Bridge) -> Result<Vec<GroupBridgeRow>> {
    bridge.db.list_enabled_bridges().await
}
