//! Sim Client (distilled spec §4.2): a single-method `reqwest` wrapper,
//! grounded on the same request-building shape as [`crate::hs::HsClient`]
//! but with no auth header beyond the shared secret and no response body
//! to decode beyond a success/failure check.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::ids::GroupId;

const SIM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct SimClient {
    region_url: String,
    bridge_secret: String,
    http: Client,
}

#[derive(Debug, Serialize)]
struct InjectRequest<'a> {
    group_uuid: String,
    from_name: &'a str,
    message: &'a str,
}

impl SimClient {
    pub fn new(region_url: impl Into<String>, bridge_secret: impl Into<String>) -> Self {
        Self {
            region_url: region_url.into(),
            bridge_secret: bridge_secret.into(),
            http: Client::builder()
                .timeout(SIM_TIMEOUT)
                .build()
                .expect("reqwest client builds"),
        }
    }

    /// POSTs the relayed message to `<region_url>/matrix/group-message`
    /// (distilled spec §4.2). Non-2xx is `SIM_API`.
    pub async fn inject(&self, group_id: GroupId, from_name: &str, message: &str) -> Result<()> {
        let url = format!(
            "{}/matrix/group-message",
            self.region_url.trim_end_matches('/')
        );
        let body = InjectRequest {
            group_uuid: group_id.to_string(),
            from_name,
            message,
        };

        debug!(%url, %group_id, "sim inject");
        let resp = self
            .http
            .post(&url)
            .header("X-Bridge-Secret", &self.bridge_secret)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::SimApi(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BridgeError::SimApi(format!("{status}: {text}")));
        }
        Ok(())
    }
}
