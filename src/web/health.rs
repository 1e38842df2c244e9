//! `/health`, `/admin/status`, and `/metrics` (distilled spec §6).
//! Grounded on the teacher crate's `web::health` module.

use std::sync::Arc;

use salvo::prelude::*;
use serde_json::json;

use crate::bridge::Bridge;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({ "status": "ok" })));
}

#[handler]
pub async fn admin_status(depot: &mut Depot, res: &mut Response) {
    let bridge = depot.get::<Arc<Bridge>>("bridge").unwrap();
    res.render(Json(json!({
        "service": crate::NAME,
        "version": crate::VERSION,
        "homeserver": bridge.config.homeserver.base_url,
        "bot": bridge.bot_mxid(),
    })));
}

#[handler]
pub async fn metrics(res: &mut Response) {
    res.render(crate::metrics::METRICS.render());
}
