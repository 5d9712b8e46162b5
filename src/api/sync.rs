use crate::config::Config;
use crate::device::client::{DeviceUser, TerminalConnector};
use crate::device::gateway::DeviceGateway;
use crate::store::MySqlSyncStore;
use crate::sync::ledger;
use crate::sync::orchestrator::{GLOBAL_SYNC_GATE, SyncOrchestrator, SyncOutcome};
use crate::utils::attendance_cache::AttendanceCache;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct SyncRunResponse {
    pub success: bool,
    #[schema(example = 120)]
    pub record_count: u32,
    #[schema(example = 3)]
    pub added_count: u32,
    #[schema(example = "synced 120 punches, 3 new rows")]
    pub message: String,
}

impl From<SyncOutcome> for SyncRunResponse {
    fn from(outcome: SyncOutcome) -> Self {
        Self {
            success: outcome.success,
            record_count: outcome.record_count,
            added_count: outcome.added_count,
            message: outcome.message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct DeviceUserListResponse {
    #[schema(example = 35)]
    pub total: usize,
    pub data: Vec<DeviceUser>,
}

fn gateway_from(config: &Config, connector: &web::Data<dyn TerminalConnector>) -> DeviceGateway {
    DeviceGateway::new(connector.clone().into_inner(), config.device_timeout())
}

/// Trigger one sync pass against the terminal
///
/// Long-running: the response arrives once the pass reaches Done,
/// bounded by the device timeout plus persistence time.
#[utoipa::path(
    post,
    path = "/api/v1/sync/run",
    responses(
        (status = 200, description = "Pass completed (check the success flag)", body = SyncRunResponse),
        (status = 409, description = "A sync pass is already running", body = Object, example = json!({
            "message": "A sync pass is already running"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Sync"
)]
pub async fn run_sync(
    pool: web::Data<MySqlPool>,
    cache: web::Data<AttendanceCache>,
    config: web::Data<Config>,
    connector: web::Data<dyn TerminalConnector>,
) -> actix_web::Result<impl Responder> {
    let orchestrator = SyncOrchestrator::new(
        gateway_from(&config, &connector),
        MySqlSyncStore::new(pool.get_ref().clone()),
        cache.get_ref().clone(),
        GLOBAL_SYNC_GATE.clone(),
        config.dedup_policy,
        config.status_rules(),
        config.sync_window_days,
    );

    match orchestrator.run().await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(SyncRunResponse::from(outcome))),
        Err(_) => Ok(HttpResponse::Conflict().json(json!({
            "message": "A sync pass is already running"
        }))),
    }
}

/// Latest sync status, for dashboard polling
#[utoipa::path(
    get,
    path = "/api/v1/sync/status",
    responses(
        (status = 200, description = "Latest sync attempt", body = crate::model::sync_status::SyncStatus),
        (status = 404, description = "No sync has run yet", body = Object, example = json!({
            "message": "No sync has run yet"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Sync"
)]
pub async fn sync_status(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let status = ledger::latest(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "failed to fetch sync status");
        ErrorInternalServerError("Database error")
    })?;

    match status {
        Some(s) => Ok(HttpResponse::Ok().json(s)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "No sync has run yet"
        }))),
    }
}

/// Recent sync attempts, newest first
#[utoipa::path(
    get,
    path = "/api/v1/sync/history",
    params(
        ("limit", Query, description = "Rows to return, 1-100 (default 20)")
    ),
    responses(
        (status = 200, description = "Recent sync attempts", body = Vec<crate::model::sync_status::SyncStatus>),
        (status = 500, description = "Internal server error")
    ),
    tag = "Sync"
)]
pub async fn sync_history(
    pool: web::Data<MySqlPool>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let rows = ledger::history(pool.get_ref(), limit).await.map_err(|e| {
        error!(error = %e, "failed to fetch sync history");
        ErrorInternalServerError("Database error")
    })?;
    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Serialize, ToSchema)]
pub struct DeviceTimeResponse {
    #[schema(example = "192.168.1.201:4370")]
    pub endpoint: String,
    /// Device-local clock. Compare against the wall clock when auditing
    /// early-morning entries for clock rollover.
    #[schema(example = "2024-01-10T10:00:00", value_type = String, format = "date-time")]
    pub device_time: chrono::NaiveDateTime,
}

/// Current clock of the terminal
#[utoipa::path(
    get,
    path = "/api/v1/device/time",
    responses(
        (status = 200, description = "Device-local time", body = DeviceTimeResponse),
        (status = 502, description = "Terminal unreachable", body = Object, example = json!({
            "message": "device operation timed out after 20s"
        }))
    ),
    tag = "Device"
)]
pub async fn device_time(
    config: web::Data<Config>,
    connector: web::Data<dyn TerminalConnector>,
) -> actix_web::Result<impl Responder> {
    let gateway = gateway_from(&config, &connector);
    match gateway.device_time().await {
        Ok(time) => Ok(HttpResponse::Ok().json(DeviceTimeResponse {
            endpoint: gateway.endpoint(),
            device_time: time,
        })),
        Err(e) => {
            error!(error = %e, "device time query failed");
            Ok(HttpResponse::BadGateway().json(json!({
                "message": e.to_string()
            })))
        }
    }
}

/// Enrollment listing straight off the terminal
#[utoipa::path(
    get,
    path = "/api/v1/device/users",
    responses(
        (status = 200, description = "Users enrolled on the terminal", body = DeviceUserListResponse),
        (status = 502, description = "Terminal unreachable", body = Object, example = json!({
            "message": "device connection failed: connection refused"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Device"
)]
pub async fn device_users(
    config: web::Data<Config>,
    connector: web::Data<dyn TerminalConnector>,
) -> actix_web::Result<impl Responder> {
    match gateway_from(&config, &connector).fetch_users().await {
        Ok(users) => Ok(HttpResponse::Ok().json(DeviceUserListResponse {
            total: users.len(),
            data: users,
        })),
        Err(e) => {
            error!(error = %e, "device user listing failed");
            Ok(HttpResponse::BadGateway().json(json!({
                "message": e.to_string()
            })))
        }
    }
}
