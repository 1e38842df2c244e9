//! HS Client implementation (distilled spec §4.1). Built on `reqwest`
//! following the teacher's `MatrixClient::request` shape: one private
//! JSON helper that attaches auth, logs at `debug`, and decodes the HS's
//! `{errcode, error}` shape on failure.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{BridgeError, Result};

use super::types::*;

/// Every outbound HS call carries the same 10s budget as the Sim client
/// and avatar fetch (distilled spec §5).
const HS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HsClient {
    base_url: String,
    as_token: String,
    http: Client,
}

impl HsClient {
    pub fn new(base_url: impl Into<String>, as_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            as_token: as_token.into(),
            http: Client::builder()
                .timeout(HS_TIMEOUT)
                .build()
                .expect("reqwest client builds"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Issues a request with the AppService bearer token, optionally
    /// impersonating `as_user` via `?user_id=` (distilled spec §4.1).
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        as_user: Option<&str>,
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> Result<T> {
        let mut url = self.url(path);
        if let Some(user_id) = as_user {
            let sep = if url.contains('?') { '&' } else { '?' };
            url.push(sep);
            url.push_str("user_id=");
            url.push_str(&urlencoding::encode(user_id));
        }

        let mut req = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.as_token);
        if let Some(json) = body {
            req = req.json(json);
        }

        debug!(%method, %url, "hs request");
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let errcode = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.errcode)
                .unwrap_or_default();
            return Err(BridgeError::HsApi(format!(
                "{method} {path} -> {status} {errcode}: {text}"
            )));
        }

        if text.is_empty() {
            return serde_json::from_str("{}")
                .map_err(|e| BridgeError::HsApi(format!("empty response: {e}")));
        }
        serde_json::from_str(&text)
            .map_err(|e| BridgeError::HsApi(format!("decoding {path} response: {e} ({text})")))
    }

    /// Like [`Self::request`], but treats `accept_errcode` as success
    /// instead of an error (the `M_USER_IN_USE`/`M_ALREADY_JOINED`
    /// idempotency rules of distilled spec §4.1).
    async fn request_idempotent(
        &self,
        method: Method,
        path: &str,
        as_user: Option<&str>,
        body: Option<&(impl Serialize + ?Sized)>,
        accept_errcode: &str,
    ) -> Result<()> {
        match self
            .request::<serde_json::Value>(method, path, as_user, body)
            .await
        {
            Ok(_) => Ok(()),
            Err(BridgeError::HsApi(msg)) if msg.contains(accept_errcode) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn lookup_room_by_alias(&self, alias: &str) -> Result<Option<String>> {
        let path = format!(
            "/_matrix/client/v3/directory/room/{}",
            urlencoding::encode(alias)
        );
        match self
            .request::<RoomAliasLookup>(Method::GET, &path, None, None::<&()>)
            .await
        {
            Ok(resp) => Ok(Some(resp.room_id)),
            Err(BridgeError::HsApi(msg)) if msg.contains("M_NOT_FOUND") || msg.contains("404") => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_room(&self, spec: &CreateRoomRequest) -> Result<String> {
        let resp: CreateRoomResponse = self
            .request(
                Method::POST,
                "/_matrix/client/v3/createRoom",
                None,
                Some(spec),
            )
            .await?;
        Ok(resp.room_id)
    }

    /// Invites `mxid` into `room` acting as the bot.
    pub async fn invite(&self, room: &str, mxid: &str) -> Result<()> {
        let path = format!("/_matrix/client/v3/rooms/{room}/invite");
        let body = serde_json::json!({ "user_id": mxid });
        self.request_idempotent(Method::POST, &path, None, Some(&body), "M_ALREADY_INVITED")
            .await
    }

    /// Joins `room` impersonating `mxid`. `M_ALREADY_JOINED` is success.
    pub async fn join_as(&self, room: &str, mxid: &str) -> Result<()> {
        let path = format!("/_matrix/client/v3/rooms/{room}/join");
        self.request_idempotent(
            Method::POST,
            &path,
            Some(mxid),
            Some(&serde_json::json!({})),
            M_ALREADY_JOINED,
        )
        .await
    }

    pub async fn get_profile(&self, mxid: &str) -> Result<ProfileResponse> {
        let path = format!("/_matrix/client/v3/profile/{mxid}");
        match self
            .request::<ProfileResponse>(Method::GET, &path, None, None::<&()>)
            .await
        {
            Ok(p) => Ok(p),
            Err(BridgeError::HsApi(msg)) if msg.contains("M_NOT_FOUND") => {
                Ok(ProfileResponse::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn set_display_name_as(&self, mxid: &str, name: &str) -> Result<()> {
        let path = format!("/_matrix/client/v3/profile/{mxid}/displayname");
        let body = serde_json::json!({ "displayname": name });
        self.request::<serde_json::Value>(Method::PUT, &path, Some(mxid), Some(&body))
            .await?;
        Ok(())
    }

    pub async fn set_avatar_url_as(&self, mxid: &str, mxc: &str) -> Result<()> {
        let path = format!("/_matrix/client/v3/profile/{mxid}/avatar_url");
        let body = serde_json::json!({ "avatar_url": mxc });
        self.request::<serde_json::Value>(Method::PUT, &path, Some(mxid), Some(&body))
            .await?;
        Ok(())
    }

    pub async fn upload_media_as(&self, mxid: &str, bytes: Vec<u8>, mime: &str) -> Result<String> {
        let mut url = self.url("/_matrix/media/v3/upload");
        url.push_str("?user_id=");
        url.push_str(&urlencoding::encode(mxid));

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.as_token)
            .header("Content-Type", mime)
            .body(bytes)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(BridgeError::HsApi(format!(
                "media upload -> {status}: {text}"
            )));
        }
        let resp: MediaUploadResponse = serde_json::from_str(&text)
            .map_err(|e| BridgeError::HsApi(format!("decoding upload response: {e}")))?;
        Ok(resp.content_uri)
    }

    pub async fn get_power_levels(&self, room: &str) -> Result<PowerLevelsContent> {
        let path = format!("/_matrix/client/v3/rooms/{room}/state/m.room.power_levels/");
        match self
            .request::<PowerLevelsContent>(Method::GET, &path, None, None::<&()>)
            .await
        {
            Ok(pl) => Ok(pl),
            Err(BridgeError::HsApi(msg)) if msg.contains("M_NOT_FOUND") => {
                Ok(PowerLevelsContent::scaffold())
            }
            Err(e) => Err(e),
        }
    }

    /// Impersonates the bot — only the bot has authority to mutate power
    /// levels (distilled spec §4.3 `syncPowerLevel`).
    pub async fn set_power_levels_as(
        &self,
        bot_mxid: &str,
        room: &str,
        pl: &PowerLevelsContent,
    ) -> Result<()> {
        let path = format!("/_matrix/client/v3/rooms/{room}/state/m.room.power_levels/");
        self.request::<serde_json::Value>(Method::PUT, &path, Some(bot_mxid), Some(pl))
            .await?;
        Ok(())
    }

    pub async fn send_message_as(
        &self,
        mxid: &str,
        room: &str,
        txn_id: &str,
        content: &MessageContent,
    ) -> Result<()> {
        let path = format!("/_matrix/client/v3/rooms/{room}/send/m.room.message/{txn_id}");
        self.request::<serde_json::Value>(Method::PUT, &path, Some(mxid), Some(content))
            .await?;
        Ok(())
    }

    /// Registers an AppService-namespaced user. `M_USER_IN_USE` is success
    /// (distilled spec §4.1).
    pub async fn register_puppet(&self, localpart: &str) -> Result<()> {
        let body = serde_json::json!({
            "type": "m.login.application_service",
            "username": localpart,
        });
        self.request_idempotent(
            Method::POST,
            "/_matrix/client/v3/register?kind=user",
            None,
            Some(&body),
            M_USER_IN_USE,
        )
        .await
    }
}

/// Re-exported for call sites that need to branch on status rather than
/// error text (e.g. the avatar-fetch's own GET, which isn't an HS call).
pub fn is_success(status: StatusCode) -> bool {
    status.is_success()
}
