//! Process-wide state (distilled spec §9: "the running server holds a
//! Config, a DB pool, and a configured HS HTTP client as long-lived
//! values created at boot and torn down on shutdown; they are passed
//! explicitly to the engines, not read from ambient globals"). Grounded
//! on the teacher crate's `bridge::WechatBridge`, stripped of its
//! in-memory user/portal/puppet caches — this bridge has none (§3
//! supplement: the HS is the sole source of truth).

use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::config::Config;
use crate::database::Database;
use crate::error::Result;
use crate::hs::HsClient;
use crate::sim::SimClient;

/// Same 10s budget as the HS/Sim clients (distilled spec §5).
const AVATAR_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The shared, immutable-after-construction handle every engine and HTTP
/// handler is given. Cheap to clone (everything inside is already an
/// `Arc`/pool handle or plain config data).
#[derive(Clone)]
pub struct Bridge {
    pub config: Config,
    pub db: Database,
    pub hs: HsClient,
    pub sim: SimClient,
    /// Plain `reqwest::Client` used only to fetch avatar images (distilled
    /// spec §4.3 `ensureAvatar`) — distinct from the HS client because it
    /// talks to an arbitrary template URL, not the homeserver.
    pub avatar_http: Client,
}

impl Bridge {
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::connect(&config.database).await?;
        db.run_migrations().await?;

        let hs = HsClient::new(&config.homeserver.base_url, &config.appservice.as_token);
        let sim = SimClient::new(&config.sim.region_url, &config.sim.bridge_secret);
        let avatar_http = Client::builder()
            .timeout(AVATAR_FETCH_TIMEOUT)
            .build()
            .expect("reqwest client builds");

        info!(
            homeserver = %config.homeserver.base_url,
            bot = %config.bot_mxid(),
            "bridge initialized"
        );

        Ok(Self {
            config,
            db,
            hs,
            sim,
            avatar_http,
        })
    }

    pub fn bot_mxid(&self) -> String {
        self.config.bot_mxid()
    }

    pub fn homeserver_domain(&self) -> &str {
        &self.config.homeserver.domain
    }
}
