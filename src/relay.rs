//! Relay Engine (distilled spec §4.4, SPEC_FULL §4.6): the two
//! directional pipelines. Grounded on the teacher crate's
//! `bridge::wechat_bridge::WechatBridge::handle_wechat_event`/event
//! dispatch shape, replacing its stateful portal/user lookups with the
//! stateless puppet pipeline (§3 supplement).

use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::error::{BridgeError, Result};
use crate::hs::Transaction;
use crate::ids::{self, AvatarId, GroupId, ZERO_AVATAR_ID};
use crate::metrics::METRICS;
use crate::puppet;

/// Inbound: Sim → HS (distilled spec §4.4 `relayFromSim`).
///
/// - Drops silently if `sender_id` is the echo-guard zero UUID.
/// - Drops silently if the group has no enabled bridge.
/// - Otherwise runs the puppet pipeline then sends the message, failing
///   the whole relay with `HS_API` on send failure.
pub async fn relay_from_sim(
    bridge: &Bridge,
    group_id: GroupId,
    sender_id: AvatarId,
    sender_name: &str,
    message: &str,
) -> Result<()> {
    if sender_id.is_zero() {
        info!(%group_id, "dropping echoed zero-uuid sender");
        return Ok(());
    }

    let Some(row) = bridge.db.get_enabled_bridge(group_id).await? else {
        info!(%group_id, "dropping relay for non-bridged group");
        return Ok(());
    };
    let room_id = row
        .room_id
        .ok_or_else(|| BridgeError::NotEnabled(group_id.to_string()))?;

    let mxid =
        puppet::run_pipeline(bridge, &room_id, group_id, sender_id, sender_name, false).await?;
    if let Err(e) = puppet::send_as_puppet(bridge, &mxid, &room_id, message).await {
        METRICS.inc_hs_api_error();
        return Err(e);
    }

    METRICS.inc_sim_to_hs();
    info!(%group_id, %mxid, "relayed sim message to hs");
    Ok(())
}

/// Outbound: HS → Sim (distilled spec §4.4 `handleTransaction`). Always
/// completes without raising — per-event failures are logged, never
/// propagated, so the AppService transaction endpoint can unconditionally
/// answer `200 {}` (distilled spec §7 propagation policy).
pub async fn handle_transaction(bridge: &Bridge, txn: Transaction) {
    for event in txn.events {
        if let Err(e) = handle_event(bridge, &event).await {
            warn!(event_id = ?event.event_id, error = %e, "dropping transaction event");
        }
    }
}

async fn handle_event(bridge: &Bridge, event: &crate::hs::RoomEvent) -> Result<()> {
    if event.event_type != "m.room.message" {
        return Ok(());
    }

    // Loop guard: the HS pushes our own puppet/bot messages back to us.
    if ids::is_bridge_own_mxid(&event.sender, &bridge.config.appservice.bot.localpart) {
        return Ok(());
    }

    let msgtype = event.content.get("msgtype").and_then(|v| v.as_str());
    if msgtype != Some("m.text") {
        return Ok(());
    }
    let body = event
        .content
        .get("body")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim();
    if body.is_empty() {
        return Ok(());
    }

    let Some(group_id) = bridge.db.get_group_for_room(event.room_id.clone()).await? else {
        return Ok(());
    };

    let display_name = event
        .unsigned
        .as_ref()
        .and_then(|u| u.sender_display_name.as_deref())
        .filter(|n| !n.is_empty())
        .unwrap_or(&event.sender);

    if let Err(e) = bridge.sim.inject(group_id, display_name, body).await {
        METRICS.inc_sim_api_error();
        return Err(e);
    }

    METRICS.inc_hs_to_sim();
    info!(%group_id, sender = %event.sender, "relayed hs message to sim");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_uuid_is_recognized() {
        assert!(ZERO_AVATAR_ID.is_zero());
    }
}
