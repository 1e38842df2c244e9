//! The Store: a pooled handle to the bridge's own `group_bridge_state`
//! table plus read-only access to Sim's membership/role tables. Grounded
//! on the teacher crate's `database::Database` (a backend-tagged enum
//! wrapping a `diesel` r2d2 pool, with `spawn_blocking`-wrapped query
//! methods), narrowed to the two backends this deployment uses
//! (sqlite for development, mysql in production — matching the reference
//! Python implementation's `mysql.connector` pool) instead of the
//! teacher's sqlite/postgres split.

mod schema;

use chrono::{NaiveDateTime, Utc};
use diesel::mysql::MysqlConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use tracing::info;

use crate::error::{BridgeError, Result};
use crate::ids::GroupId;

use schema::{group_bridge_state, os_groups_membership, os_groups_roles};

#[derive(Debug, Clone, Serialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = group_bridge_state)]
pub struct GroupBridgeRow {
    pub group_uuid: String,
    pub enabled: bool,
    pub room_id: Option<String>,
    pub enabled_by: Option<String>,
    pub enabled_at: Option<NaiveDateTime>,
}

impl GroupBridgeRow {
    pub fn new(group_id: GroupId, room_id: impl Into<String>, enabled_by: impl Into<String>) -> Self {
        Self {
            group_uuid: group_id.to_string(),
            enabled: true,
            room_id: Some(room_id.into()),
            enabled_by: Some(enabled_by.into()),
            enabled_at: Some(Utc::now().naive_utc()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    inner: DatabaseInner,
}

#[derive(Debug, Clone)]
enum DatabaseInner {
    Sqlite(Pool<ConnectionManager<SqliteConnection>>),
    Mysql(Pool<ConnectionManager<MysqlConnection>>),
}

impl Database {
    pub async fn connect(cfg: &crate::config::DatabaseConfig) -> Result<Self> {
        let max_open = cfg.max_open_conns.max(1);
        let max_idle = cfg.max_idle_conns.min(max_open);
        let db_type = cfg.r#type.trim().to_ascii_lowercase();

        match db_type.as_str() {
            "sqlite" | "sqlite3" => {
                info!("connecting to sqlite database");
                let manager = ConnectionManager::<SqliteConnection>::new(cfg.name.clone());
                let pool = Pool::builder()
                    .max_size(max_open)
                    .min_idle(Some(max_idle))
                    .build(manager)
                    .map_err(|e| BridgeError::Database(e.to_string()))?;
                Ok(Self {
                    inner: DatabaseInner::Sqlite(pool),
                })
            }
            "mysql" | "mariadb" => {
                info!("connecting to mysql database at {}:{}", cfg.host, cfg.port);
                let uri = format!(
                    "mysql://{}:{}@{}:{}/{}",
                    urlencoding::encode(&cfg.user),
                    urlencoding::encode(&cfg.password),
                    cfg.host,
                    cfg.port,
                    cfg.name
                );
                let manager = ConnectionManager::<MysqlConnection>::new(uri);
                let pool = Pool::builder()
                    .max_size(max_open)
                    .min_idle(Some(max_idle))
                    .build(manager)
                    .map_err(|e| BridgeError::Database(e.to_string()))?;
                Ok(Self {
                    inner: DatabaseInner::Mysql(pool),
                })
            }
            other => Err(BridgeError::Config(format!(
                "unsupported database type: {other} (supported: sqlite, mysql)"
            ))),
        }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let ddl_sqlite = "CREATE TABLE IF NOT EXISTS group_bridge_state (
            group_uuid CHAR(36) PRIMARY KEY,
            enabled INTEGER NOT NULL DEFAULT 0,
            room_id VARCHAR(255),
            enabled_by CHAR(36),
            enabled_at DATETIME
        )";
        let ddl_mysql = "CREATE TABLE IF NOT EXISTS group_bridge_state (
            group_uuid CHAR(36) PRIMARY KEY,
            enabled TINYINT NOT NULL DEFAULT 0,
            room_id VARCHAR(255),
            enabled_by CHAR(36),
            enabled_at DATETIME
        )";
        match &self.inner {
            DatabaseInner::Sqlite(_) => {
                self.with_sqlite(move |conn| {
                    diesel::sql_query(ddl_sqlite).execute(conn)?;
                    Ok(())
                })
                .await
            }
            DatabaseInner::Mysql(_) => {
                self.with_mysql(move |conn| {
                    diesel::sql_query(ddl_mysql).execute(conn)?;
                    Ok(())
                })
                .await
            }
        }
    }

    /// Runs a raw statement against whichever backend is active. Used by
    /// integration tests to seed the Sim-owned tables this crate only
    /// ever reads (`os_groups_membership`, `os_groups_roles`), which this
    /// crate's own migrations never create.
    pub async fn exec_raw(&self, sql: String) -> Result<()> {
        self.with_conn(
            {
                let sql = sql.clone();
                move |conn| {
                    diesel::sql_query(sql).execute(conn)?;
                    Ok(())
                }
            },
            move |conn| {
                diesel::sql_query(sql).execute(conn)?;
                Ok(())
            },
        )
        .await
    }

    async fn with_sqlite<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let pool = match &self.inner {
            DatabaseInner::Sqlite(pool) => pool.clone(),
            DatabaseInner::Mysql(_) => {
                return Err(BridgeError::Database("expected sqlite database".into()));
            }
        };
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(BridgeError::from)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| BridgeError::Database(format!("task join error: {e}")))?
    }

    async fn with_mysql<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut MysqlConnection) -> Result<T> + Send + 'static,
    {
        let pool = match &self.inner {
            DatabaseInner::Mysql(pool) => pool.clone(),
            DatabaseInner::Sqlite(_) => {
                return Err(BridgeError::Database("expected mysql database".into()));
            }
        };
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(BridgeError::from)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| BridgeError::Database(format!("task join error: {e}")))?
    }

    /// Dispatches a blocking diesel closure to whichever backend is active.
    /// Both arms must produce the same `T`.
    async fn with_conn<T, FS, FM>(&self, sqlite_fn: FS, mysql_fn: FM) -> Result<T>
    where
        T: Send + 'static,
        FS: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        FM: FnOnce(&mut MysqlConnection) -> Result<T> + Send + 'static,
    {
        match &self.inner {
            DatabaseInner::Sqlite(_) => self.with_sqlite(sqlite_fn).await,
            DatabaseInner::Mysql(_) => self.with_mysql(mysql_fn).await,
        }
    }

    // ─── group_bridge_state ─────────────────────────────────────────

    pub async fn get_enabled_bridge(&self, group_id: GroupId) -> Result<Option<GroupBridgeRow>> {
        let uuid = group_id.to_string();
        self.with_conn(
            {
                let uuid = uuid.clone();
                move |conn| {
                    Ok(group_bridge_state::table
                        .filter(group_bridge_state::group_uuid.eq(&uuid))
                        .filter(group_bridge_state::enabled.eq(true))
                        .first::<GroupBridgeRow>(conn)
                        .optional()?)
                }
            },
            move |conn| {
                Ok(group_bridge_state::table
                    .filter(group_bridge_state::group_uuid.eq(&uuid))
                    .filter(group_bridge_state::enabled.eq(true))
                    .first::<GroupBridgeRow>(conn)
                    .optional()?)
            },
        )
        .await
    }

    pub async fn get_group_for_room(&self, room_id: String) -> Result<Option<GroupId>> {
        self.with_conn(
            {
                let room_id = room_id.clone();
                move |conn| {
                    let uuid: Option<String> = group_bridge_state::table
                        .filter(group_bridge_state::room_id.eq(&room_id))
                        .filter(group_bridge_state::enabled.eq(true))
                        .select(group_bridge_state::group_uuid)
                        .first(conn)
                        .optional()?;
                    Ok(uuid)
                }
            },
            move |conn| {
                let uuid: Option<String> = group_bridge_state::table
                    .filter(group_bridge_state::room_id.eq(&room_id))
                    .filter(group_bridge_state::enabled.eq(true))
                    .select(group_bridge_state::group_uuid)
                    .first(conn)
                    .optional()?;
                Ok(uuid)
            },
        )
        .await
        .map(|opt| opt.and_then(|s| s.parse().ok()))
    }

    /// Upserts a row. Diesel's portable upsert (`ON CONFLICT`/`ON DUPLICATE KEY`)
    /// differs per backend, so this does an explicit check-then-write inside
    /// the caller's transaction instead (see `BridgeAdmin::enable_bridge`).
    pub async fn upsert_group_bridge(&self, row: GroupBridgeRow) -> Result<()> {
        self.with_conn(
            {
                let row = row.clone();
                move |conn| {
                    conn.transaction(|conn| {
                        let existing = group_bridge_state::table
                            .filter(group_bridge_state::group_uuid.eq(&row.group_uuid))
                            .first::<GroupBridgeRow>(conn)
                            .optional()?;
                        if existing.is_some() {
                            diesel::update(
                                group_bridge_state::table
                                    .filter(group_bridge_state::group_uuid.eq(&row.group_uuid)),
                            )
                            .set(&row)
                            .execute(conn)?;
                        } else {
                            diesel::insert_into(group_bridge_state::table)
                                .values(&row)
                                .execute(conn)?;
                        }
                        Ok::<_, BridgeError>(())
                    })
                }
            },
            move |conn| {
                conn.transaction(|conn| {
                    let existing = group_bridge_state::table
                        .filter(group_bridge_state::group_uuid.eq(&row.group_uuid))
                        .first::<GroupBridgeRow>(conn)
                        .optional()?;
                    if existing.is_some() {
                        diesel::update(
                            group_bridge_state::table
                                .filter(group_bridge_state::group_uuid.eq(&row.group_uuid)),
                        )
                        .set(&row)
                        .execute(conn)?;
                    } else {
                        diesel::insert_into(group_bridge_state::table)
                            .values(&row)
                            .execute(conn)?;
                    }
                    Ok::<_, BridgeError>(())
                })
            },
        )
        .await
    }

    pub async fn list_enabled_bridges(&self) -> Result<Vec<GroupBridgeRow>> {
        self.with_conn(
            |conn| {
                Ok(group_bridge_state::table
                    .filter(group_bridge_state::enabled.eq(true))
                    .load::<GroupBridgeRow>(conn)?)
            },
            |conn| {
                Ok(group_bridge_state::table
                    .filter(group_bridge_state::enabled.eq(true))
                    .load::<GroupBridgeRow>(conn)?)
            },
        )
        .await
    }

    // ─── read-only Sim tables ────────────────────────────────────────

    /// `(Powers for this member's selected role)`, per distilled spec §4.5 step 1.
    pub async fn member_powers(&self, group_id: GroupId, principal_id: &str) -> Result<Option<i64>> {
        let group_uuid = group_id.to_string();
        let principal_id = principal_id.to_string();
        self.with_conn(
            {
                let (group_uuid, principal_id) = (group_uuid.clone(), principal_id.clone());
                move |conn| {
                    let powers: Option<i64> = os_groups_membership::table
                        .inner_join(
                            os_groups_roles::table.on(os_groups_roles::GroupID
                                .eq(os_groups_membership::GroupID)
                                .and(os_groups_roles::RoleID.eq(os_groups_membership::SelectedRoleID))),
                        )
                        .filter(os_groups_membership::GroupID.eq(&group_uuid))
                        .filter(os_groups_membership::PrincipalID.eq(&principal_id))
                        .select(os_groups_roles::Powers)
                        .first(conn)
                        .optional()?;
                    Ok(powers)
                }
            },
            move |conn| {
                let powers: Option<i64> = os_groups_membership::table
                    .inner_join(
                        os_groups_roles::table.on(os_groups_roles::GroupID
                            .eq(os_groups_membership::GroupID)
                            .and(os_groups_roles::RoleID.eq(os_groups_membership::SelectedRoleID))),
                    )
                    .filter(os_groups_membership::GroupID.eq(&group_uuid))
                    .filter(os_groups_membership::PrincipalID.eq(&principal_id))
                    .select(os_groups_roles::Powers)
                    .first(conn)
                    .optional()?;
                Ok(powers)
            },
        )
        .await
    }

    /// Highest power across all (member, role) joins for the group (distilled spec §4.5 step 2).
    pub async fn max_group_powers(&self, group_id: GroupId) -> Result<Option<i64>> {
        let group_uuid = group_id.to_string();
        self.with_conn(
            {
                let group_uuid = group_uuid.clone();
                move |conn| {
                    let max: Option<Option<i64>> = os_groups_membership::table
                        .inner_join(
                            os_groups_roles::table.on(os_groups_roles::GroupID
                                .eq(os_groups_membership::GroupID)
                                .and(os_groups_roles::RoleID.eq(os_groups_membership::SelectedRoleID))),
                        )
                        .filter(os_groups_membership::GroupID.eq(&group_uuid))
                        .select(diesel::dsl::max(os_groups_roles::Powers))
                        .first(conn)
                        .optional()?;
                    Ok(max.flatten())
                }
            },
            move |conn| {
                let max: Option<Option<i64>> = os_groups_membership::table
                    .inner_join(
                        os_groups_roles::table.on(os_groups_roles::GroupID
                            .eq(os_groups_membership::GroupID)
                            .and(os_groups_roles::RoleID.eq(os_groups_membership::SelectedRoleID))),
                    )
                    .filter(os_groups_membership::GroupID.eq(&group_uuid))
                    .select(diesel::dsl::max(os_groups_roles::Powers))
                    .first(conn)
                    .optional()?;
                Ok(max.flatten())
            },
        )
        .await
    }

    /// All `PrincipalID` values for a group, for `resyncGroup` (distilled spec §4.6).
    pub async fn group_principals(&self, group_id: GroupId) -> Result<Vec<String>> {
        let group_uuid = group_id.to_string();
        self.with_conn(
            {
                let group_uuid = group_uuid.clone();
                move |conn| {
                    Ok(os_groups_membership::table
                        .filter(os_groups_membership::GroupID.eq(&group_uuid))
                        .select(os_groups_membership::PrincipalID)
                        .load(conn)?)
                }
            },
            move |conn| {
                Ok(os_groups_membership::table
                    .filter(os_groups_membership::GroupID.eq(&group_uuid))
                    .select(os_groups_membership::PrincipalID)
                    .load(conn)?)
            },
        )
        .await
    }
}
