//! `POST /sim/event` (distilled spec §6): inbound Sim→HS relay entry
//! point. Grounded on the teacher crate's webhook-ingest handler shape,
//! replacing its WeChat event envelope with the Sim `group_message`
//! payload (distilled spec §4.4).

use std::sync::Arc;

use salvo::prelude::*;
use serde::Deserialize;
use tracing::warn;

use crate::auth::check_bridge_secret;
use crate::bridge::Bridge;
use crate::ids::{AvatarId, GroupId};
use crate::relay;

#[derive(Debug, Deserialize)]
pub struct SimEventBody {
    #[serde(rename = "type")]
    pub event_type: String,
    pub group_uuid: String,
    pub from_uuid: String,
    pub from_name: String,
    pub message: String,
}

#[handler]
pub async fn sim_event(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let bridge = depot.get::<Arc<Bridge>>("bridge").unwrap().clone();

    if !check_bridge_secret(
        req.header::<String>("X-Bridge-Secret").as_deref(),
        &bridge.config.sim.bridge_secret,
    ) {
        res.status_code(StatusCode::UNAUTHORIZED);
        res.render(Json(serde_json::json!({ "error": "unauthorized" })));
        return;
    }

    let body: SimEventBody = match req.parse_json().await {
        Ok(b) => b,
        Err(e) => {
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(serde_json::json!({ "error": format!("bad request: {e}") })));
            return;
        }
    };

    if body.event_type != "group_message" {
        res.status_code(StatusCode::BAD_REQUEST);
        res.render(Json(
            serde_json::json!({ "error": format!("unsupported event type: {}", body.event_type) }),
        ));
        return;
    }

    let group_id: GroupId = match body.group_uuid.parse() {
        Ok(id) => id,
        Err(_) => {
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(serde_json::json!({ "error": "invalid group_uuid" })));
            return;
        }
    };
    let sender_id: AvatarId = match body.from_uuid.parse() {
        Ok(id) => id,
        Err(_) => {
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(serde_json::json!({ "error": "invalid from_uuid" })));
            return;
        }
    };

    match relay::relay_from_sim(&bridge, group_id, sender_id, &body.from_name, &body.message).await {
        Ok(()) => res.render(Json(serde_json::json!({ "ok": true }))),
        Err(e) => {
            warn!(error = %e, "sim event relay failed");
            res.status_code(e.status_code());
            res.render(Json(e.body()));
        }
    }
}
