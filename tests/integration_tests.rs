//! End-to-end scenarios against the engines with `wiremock`-backed HS/Sim
//! servers, grounded on the teacher crate's own `tests/integration_tests.rs`
//! (one `Bridge`-shaped fixture built by hand, `wiremock::MockServer`
//! stand-ins for the remote services, assertions on both return values and
//! which calls were actually made).

use std::sync::atomic::{AtomicU64, Ordering};

use lighthouse_bridge::admin;
use lighthouse_bridge::bridge::Bridge;
use lighthouse_bridge::config::{
    AppServiceConfig, AvatarConfig, BotConfig, Config, DatabaseConfig, HomeserverConfig,
    LoggingConfig, ServerConfig, SimConfig,
};
use lighthouse_bridge::database::GroupBridgeRow;
use lighthouse_bridge::error::BridgeError;
use lighthouse_bridge::hs::{RoomEvent, Transaction, UnsignedData};
use lighthouse_bridge::ids::{AvatarId, GroupId, ZERO_AVATAR_ID};
use lighthouse_bridge::relay;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh `Bridge` wired to caller-supplied HS/Sim mock servers, backed
/// by its own in-memory sqlite database. The pool is capped at one
/// connection so the single connection ever handed out keeps the shared
/// `:memory:` database alive for the fixture's lifetime.
async fn test_bridge(hs_uri: &str, sim_uri: &str) -> Bridge {
    let _n = DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    let config = Config {
        homeserver: HomeserverConfig {
            base_url: hs_uri.to_string(),
            domain: "hs.example".to_string(),
        },
        appservice: AppServiceConfig {
            as_token: "as-secret".to_string(),
            hs_token: "hs-secret".to_string(),
            bot: BotConfig {
                localpart: "opensim_bot".to_string(),
                displayname: "Lighthouse Bridge".to_string(),
            },
        },
        sim: SimConfig {
            bridge_secret: "sim-secret".to_string(),
            region_url: sim_uri.to_string(),
        },
        database: DatabaseConfig {
            r#type: "sqlite".to_string(),
            host: String::new(),
            port: 0,
            name: ":memory:".to_string(),
            user: String::new(),
            password: String::new(),
            max_open_conns: 1,
            max_idle_conns: 1,
        },
        avatar: AvatarConfig {
            base_url: String::new(),
            cache_dir: "./data/avatar-cache".to_string(),
        },
        server: ServerConfig::default(),
        logging: LoggingConfig::default(),
    };

    Bridge::new(config).await.expect("bridge constructs")
}

async fn seed_member(bridge: &Bridge, group: GroupId, principal: AvatarId, powers: i64) {
    let role = uuid::Uuid::new_v4();
    bridge
        .db
        .exec_raw(
            "CREATE TABLE IF NOT EXISTS os_groups_membership (
                GroupID TEXT NOT NULL, PrincipalID TEXT NOT NULL, SelectedRoleID TEXT NOT NULL)"
                .to_string(),
        )
        .await
        .unwrap();
    bridge
        .db
        .exec_raw(
            "CREATE TABLE IF NOT EXISTS os_groups_roles (
                GroupID TEXT NOT NULL, RoleID TEXT NOT NULL, Powers INTEGER NOT NULL)"
                .to_string(),
        )
        .await
        .unwrap();
    bridge
        .db
        .exec_raw(format!(
            "INSERT INTO os_groups_membership (GroupID, PrincipalID, SelectedRoleID) VALUES ('{group}', '{principal}', '{role}')"
        ))
        .await
        .unwrap();
    bridge
        .db
        .exec_raw(format!(
            "INSERT INTO os_groups_roles (GroupID, RoleID, Powers) VALUES ('{group}', '{role}', {powers})"
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn enable_bridge_creates_room_and_persists_row() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/_matrix/client/v3/directory/room/.*$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "errcode": "M_NOT_FOUND", "error": "not found"
        })))
        .mount(&hs)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/createRoom$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "room_id": "!abc:hs.example" })),
        )
        .mount(&hs)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/register$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/invite$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/join$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "room_id": "!abc:hs.example" })))
        .mount(&hs)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/state/m\.room\.power_levels/$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "event_id": "$pl1" })))
        .mount(&hs)
        .await;

    let group = GroupId::new(uuid::Uuid::new_v4());
    let founder: AvatarId = "11111111-2222-3333-4444-555555555555".parse().unwrap();

    let room_id = admin::enable_bridge(&bridge, group, "Sailing Club", founder)
        .await
        .expect("enable succeeds");
    assert_eq!(room_id, "!abc:hs.example");

    let row = bridge
        .db
        .get_enabled_bridge(group)
        .await
        .unwrap()
        .expect("row persisted");
    assert!(row.enabled);
    assert_eq!(row.room_id.as_deref(), Some("!abc:hs.example"));

    // Calling again is idempotent: no second createRoom call needed,
    // the existing row short-circuits the flow entirely.
    let again = admin::enable_bridge(&bridge, group, "Sailing Club", founder)
        .await
        .expect("second call is idempotent");
    assert_eq!(again, "!abc:hs.example");
}

#[tokio::test]
async fn relay_from_sim_runs_pipeline_and_sends() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;

    let group = GroupId::new(uuid::Uuid::new_v4());
    let sender: AvatarId = "66666666-7777-8888-9999-aaaaaaaaaaaa".parse().unwrap();
    let row = GroupBridgeRow::new(group, "!room:hs.example", "00000000-0000-0000-0000-000000000001");
    bridge.db.upsert_group_bridge(row).await.unwrap();

    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/register$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/_matrix/client/v3/profile/.*$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "displayname": "Someone Else"
        })))
        .mount(&hs)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/_matrix/client/v3/profile/.*/displayname$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/invite$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/join$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/state/m\.room\.power_levels/$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "errcode": "M_NOT_FOUND", "error": "no state"
        })))
        .mount(&hs)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/state/m\.room\.power_levels/$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/send/m\.room\.message/.*$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "event_id": "$m1" })))
        .mount(&hs)
        .await;

    relay::relay_from_sim(&bridge, group, sender, "Alice Example", "hello from sim")
        .await
        .expect("relay succeeds");
}

#[tokio::test]
async fn relay_from_sim_drops_zero_uuid_echo() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;
    let group = GroupId::new(uuid::Uuid::new_v4());

    // No mocks mounted on either server: if the echo guard didn't short-circuit,
    // any outbound call would hit wiremock's default 404 and surface as an error.
    let result = relay::relay_from_sim(&bridge, group, ZERO_AVATAR_ID, "bridge", "echo").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn relay_from_sim_drops_non_bridged_group() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;
    let group = GroupId::new(uuid::Uuid::new_v4());
    let sender: AvatarId = "22222222-3333-4444-5555-666666666666".parse().unwrap();

    let result = relay::relay_from_sim(&bridge, group, sender, "Alice", "hi").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn handle_transaction_drops_own_sender_without_calling_sim() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/matrix/group-message$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&sim)
        .await;

    let txn = Transaction {
        events: vec![RoomEvent {
            event_type: "m.room.message".to_string(),
            content: serde_json::json!({ "msgtype": "m.text", "body": "loop" }),
            sender: "@os_deadbeefdeadbeefdeadbeefdeadbeef:hs.example".to_string(),
            room_id: "!room:hs.example".to_string(),
            event_id: Some("$e1".to_string()),
            unsigned: None,
        }],
    };

    // Never propagates errors; completing at all is the pass condition.
    // The mounted `expect(0)` panics on drop if the loop guard let the
    // Sim call through.
    relay::handle_transaction(&bridge, txn).await;
}

#[tokio::test]
async fn handle_transaction_relays_real_sender_to_sim() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;

    let group = GroupId::new(uuid::Uuid::new_v4());
    let row = GroupBridgeRow::new(group, "!room:hs.example", "00000000-0000-0000-0000-000000000001");
    bridge.db.upsert_group_bridge(row).await.unwrap();

    Mock::given(method("POST"))
        .and(path_regex(r"^/matrix/group-message$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&sim)
        .await;

    let txn = Transaction {
        events: vec![RoomEvent {
            event_type: "m.room.message".to_string(),
            content: serde_json::json!({ "msgtype": "m.text", "body": "hello from matrix" }),
            sender: "@alice:hs.example".to_string(),
            room_id: "!room:hs.example".to_string(),
            event_id: Some("$e2".to_string()),
            unsigned: Some(UnsignedData {
                sender_display_name: Some("Alice".to_string()),
            }),
        }],
    };

    // `expect(1)` panics on drop if the message never reached Sim.
    relay::handle_transaction(&bridge, txn).await;
}

#[tokio::test]
async fn resync_group_requires_enabled_row() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;
    let group = GroupId::new(uuid::Uuid::new_v4());

    let err = admin::resync_group(&bridge, group).await.unwrap_err();
    assert!(matches!(err, BridgeError::NotEnabled(_)));
}

#[tokio::test]
async fn resync_group_syncs_every_valid_principal() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;

    let group = GroupId::new(uuid::Uuid::new_v4());
    let row = GroupBridgeRow::new(group, "!room:hs.example", "00000000-0000-0000-0000-000000000001");
    bridge.db.upsert_group_bridge(row).await.unwrap();

    let member_a: AvatarId = "aaaaaaaa-1111-2222-3333-444444444444".parse().unwrap();
    let member_b: AvatarId = "bbbbbbbb-1111-2222-3333-444444444444".parse().unwrap();
    seed_member(&bridge, group, member_a, 50).await;
    seed_member(&bridge, group, member_b, 100).await;
    // An invalid principal row: not a UUID, must be skipped rather than aborting the batch.
    bridge
        .db
        .exec_raw(format!(
            "INSERT INTO os_groups_membership (GroupID, PrincipalID, SelectedRoleID) VALUES ('{group}', 'not-a-uuid', 'x')"
        ))
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/register$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/_matrix/client/v3/profile/.*/displayname$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/invite$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/join$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/state/m\.room\.power_levels/$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "errcode": "M_NOT_FOUND", "error": "no state"
        })))
        .mount(&hs)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/.*/state/m\.room\.power_levels/$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&hs)
        .await;

    let synced = admin::resync_group(&bridge, group).await.expect("resync completes");
    assert_eq!(synced, 2, "the malformed principal is skipped, not counted");
}

#[tokio::test]
async fn register_puppet_treats_user_in_use_as_success() {
    let hs = MockServer::start().await;
    let sim = MockServer::start().await;
    let bridge = test_bridge(&hs.uri(), &sim.uri()).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/register$"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errcode": "M_USER_IN_USE", "error": "already registered"
        })))
        .mount(&hs)
        .await;

    let avatar: AvatarId = "cccccccc-1111-2222-3333-444444444444".parse().unwrap();
    let mxid = lighthouse_bridge::puppet::ensure_user(&bridge, avatar)
        .await
        .expect("M_USER_IN_USE is idempotent success");
    assert_eq!(mxid, avatar.puppet_mxid("hs.example"));
}
