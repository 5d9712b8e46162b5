use crate::config::Config;
use crate::model::attendance::{AttendanceEntry, DedupPolicy};
use crate::store;
use crate::sync::index::EmployeeIndex;
use crate::sync::normalize::collapse_one_per_day;
use crate::sync::resolver::Resolver;
use crate::utils::attendance_cache::AttendanceCache;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub date: NaiveDate,
    pub policy: Option<DedupPolicy>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    #[schema(example = "2024-01-10", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub policy: DedupPolicy,
    #[schema(example = 42)]
    pub total: usize,
    pub data: Vec<AttendanceEntry>,
}

/// Daily attendance, served from cache when possible
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(
        ("date", Query, description = "Calendar day, YYYY-MM-DD"),
        ("policy", Query, description = "Dedup policy: one-per-employee-per-day or all-punches (defaults to the configured policy)")
    ),
    responses(
        (status = 200, description = "Attendance entries for the day", body = AttendanceListResponse),
        (status = 400, description = "Bad date or policy"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    pool: web::Data<MySqlPool>,
    cache: web::Data<AttendanceCache>,
    config: web::Data<Config>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    let policy = query.policy.unwrap_or(config.dedup_policy);

    if let Some(hit) = cache.get(query.date, policy).await {
        debug!(date = %query.date, policy = %policy, "attendance served from cache");
        return Ok(HttpResponse::Ok().json(AttendanceListResponse {
            date: query.date,
            policy,
            total: hit.len(),
            data: hit.as_ref().clone(),
        }));
    }

    let mut entries = store::attendance::for_date(pool.get_ref(), query.date)
        .await
        .map_err(|e| {
            error!(error = %e, date = %query.date, "failed to fetch attendance");
            ErrorInternalServerError("Database error")
        })?;

    // Rows synced under all-punches still answer a one-per-day query.
    if policy == DedupPolicy::OnePerEmployeePerDay {
        entries = collapse_one_per_day(entries);
    }

    if entries.iter().any(|e| e.employee_id.is_none()) {
        late_resolve(pool.get_ref(), &mut entries).await;
    }

    cache.put(query.date, policy, entries.clone()).await;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        date: query.date,
        policy,
        total: entries.len(),
        data: entries,
    }))
}

/// Second-chance resolution for rows that were persisted unresolved,
/// against a fresh registry snapshot. Best-effort: a failure here still
/// serves the rows, just unresolved.
async fn late_resolve(pool: &MySqlPool, entries: &mut [AttendanceEntry]) {
    let registry = match store::employees::load_registry(pool).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "registry load failed, serving unresolved rows as-is");
            return;
        }
    };
    let index = EmployeeIndex::build(registry);
    let mut resolver = Resolver::new();

    for entry in entries.iter_mut().filter(|e| e.employee_id.is_none()) {
        let resolution = resolver.resolve(&entry.device_user_id, entry.employee_no.as_deref(), &index);
        let Some(employee) = resolution.employee else {
            continue;
        };
        match store::attendance::attach_resolution(pool, entry.id, employee.id, resolution.method)
            .await
        {
            Ok(n) if n > 0 => {
                entry.employee_id = Some(employee.id);
                entry.resolution = resolution.method;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, entry_id = entry.id, "failed to attach late resolution");
            }
        }
    }

    let stats = resolver.stats();
    if stats.matched() > 0 {
        debug!(matched = stats.matched(), unmatched = stats.unmatched(), "late resolution pass");
    }
}
