//! `/admin/bridge/*` routes (distilled spec §6, §4.6/§4.8). Grounded on
//! the teacher crate's `web::provisioning` handlers, replaced with the
//! distilled spec's enable/resync/list contract.

use std::sync::Arc;

use salvo::prelude::*;
use serde::Deserialize;
use tracing::warn;

use crate::admin;
use crate::auth::check_bridge_secret;
use crate::bridge::Bridge;
use crate::ids::{AvatarId, GroupId};

#[derive(Debug, Deserialize)]
pub struct EnableBody {
    #[serde(rename = "GroupUuid")]
    pub group_uuid: String,
    #[serde(rename = "GroupName")]
    pub group_name: String,
    #[serde(rename = "FounderAvatarUuid")]
    pub founder_avatar_uuid: String,
}

/// `POST /admin/bridge/enable` — trusted, no auth header check (distilled
/// spec §6 marks this route "none (trusted)"; it is expected to sit
/// behind the Sim-side admin tooling, not the open internet).
#[handler]
pub async fn enable(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let bridge = depot.get::<Arc<Bridge>>("bridge").unwrap().clone();

    let body: EnableBody = match req.parse_json().await {
        Ok(b) => b,
        Err(e) => {
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(serde_json::json!({ "error": format!("bad request: {e}") })));
            return;
        }
    };

    let group_id: GroupId = match body.group_uuid.parse() {
        Ok(id) => id,
        Err(_) => {
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(serde_json::json!({ "error": "invalid GroupUuid" })));
            return;
        }
    };
    let founder: AvatarId = match body.founder_avatar_uuid.parse() {
        Ok(id) => id,
        Err(_) => {
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(serde_json::json!({ "error": "invalid FounderAvatarUuid" })));
            return;
        }
    };

    match admin::enable_bridge(&bridge, group_id, &body.group_name, founder).await {
        Ok(room_id) => res.render(Json(serde_json::json!({ "roomId": room_id }))),
        Err(e) => {
            warn!(error = %e, "enable_bridge failed");
            res.status_code(e.status_code());
            res.render(Json(e.body()));
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResyncBody {
    #[serde(rename = "GroupUuid")]
    pub group_uuid: String,
}

/// `POST /admin/bridge/resync`.
#[handler]
pub async fn resync(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let bridge = depot.get::<Arc<Bridge>>("bridge").unwrap().clone();

    if !check_bridge_secret(
        req.header::<String>("X-Bridge-Secret").as_deref(),
        &bridge.config.sim.bridge_secret,
    ) {
        res.status_code(StatusCode::UNAUTHORIZED);
        res.render(Json(serde_json::json!({ "error": "unauthorized" })));
        return;
    }

    let body: ResyncBody = match req.parse_json().await {
        Ok(b) => b,
        Err(e) => {
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(serde_json::json!({ "error": format!("bad request: {e}") })));
            return;
        }
    };
    let group_id: GroupId = match body.group_uuid.parse() {
        Ok(id) => id,
        Err(_) => {
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(serde_json::json!({ "error": "invalid GroupUuid" })));
            return;
        }
    };

    match admin::resync_group(&bridge, group_id).await {
        Ok(_) => res.render(Json(serde_json::json!({ "status": "resynced" }))),
        Err(e) => {
            warn!(error = %e, "resync_group failed");
            res.status_code(e.status_code());
            res.render(Json(e.body()));
        }
    }
}

/// `GET /admin/bridge/list`.
#[handler]
pub async fn list(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let bridge = depot.get::<Arc<Bridge>>("bridge").unwrap().clone();

    if !check_bridge_secret(
        req.header::<String>("X-Bridge-Secret").as_deref(),
        &bridge.config.sim.bridge_secret,
    ) {
        res.status_code(StatusCode::UNAUTHORIZED);
        res.render(Json(serde_json::json!({ "error": "unauthorized" })));
        return;
    }

    match admin::list_enabled(&bridge).await {
        Ok(rows) => {
            let count = rows.len();
            res.render(Json(serde_json::json!({ "bridges": rows, "count": count })));
        }
        Err(e) => {
            warn!(error = %e, "list_enabled failed");
            res.status_code(e.status_code());
            res.render(Json(e.body()));
        }
    }
}

/// `POST /admin/oar/download` — documented stub (SPEC_FULL §6 supplement):
/// present in the system this spec was distilled from as a future
/// region-backup feature, out of scope for relay/puppet correctness.
#[handler]
pub async fn oar_download_stub(res: &mut Response) {
    res.status_code(StatusCode::NOT_IMPLEMENTED);
    res.render(Json(serde_json::json!({ "status": "not_implemented" })));
}
