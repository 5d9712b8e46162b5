use crate::model::attendance::{AttendanceEntry, NewAttendanceEntry, ResolutionMethod};
use chrono::{NaiveDate, NaiveTime};
use futures_util::StreamExt;
use sqlx::MySqlPool;
use std::collections::HashSet;
use tracing::debug;

const SELECT_COLUMNS: &str = "id, date, device_user_id, employee_no, time_in, status, employee_id, resolution, synced_at";

pub async fn for_date(
    pool: &MySqlPool,
    date: NaiveDate,
) -> Result<Vec<AttendanceEntry>, sqlx::Error> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM device_attendance WHERE date = ? ORDER BY device_user_id, time_in"
    );
    sqlx::query_as::<_, AttendanceEntry>(&sql)
        .bind(date)
        .fetch_all(pool)
        .await
}

/// Diff keys already persisted for the given dates.
pub async fn existing_keys(
    pool: &MySqlPool,
    dates: &[NaiveDate],
) -> Result<HashSet<(NaiveDate, String, NaiveTime)>, sqlx::Error> {
    if dates.is_empty() {
        return Ok(HashSet::new());
    }

    // IN clause built dynamically, one placeholder per date.
    let placeholders = vec!["?"; dates.len()].join(", ");
    let sql = format!(
        "SELECT date, device_user_id, time_in FROM device_attendance WHERE date IN ({placeholders})"
    );
    debug!(sql = %sql, dates = dates.len(), "loading existing punch keys");

    let mut query = sqlx::query_as::<_, (NaiveDate, String, NaiveTime)>(&sql);
    for date in dates {
        query = query.bind(date);
    }

    // Streamed rather than collected twice; a wide window over a busy
    // terminal can carry tens of thousands of keys.
    let mut stream = query.fetch(pool);
    let mut keys = HashSet::new();
    while let Some(row) = stream.next().await {
        keys.insert(row?);
    }
    Ok(keys)
}

/// Inserts new rows inside one transaction so a failed pass leaves no
/// partial batch behind. Returns the number of rows written.
pub async fn insert_entries(
    pool: &MySqlPool,
    entries: &[NewAttendanceEntry],
) -> Result<u64, sqlx::Error> {
    if entries.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO device_attendance
            (date, device_user_id, employee_no, time_in, status, employee_id, resolution, synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.date)
        .bind(&entry.device_user_id)
        .bind(&entry.employee_no)
        .bind(entry.time_in)
        .bind(entry.status)
        .bind(entry.employee_id)
        .bind(entry.resolution)
        .bind(entry.synced_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(entries.len() as u64)
}

/// The one permitted update: attach a late-resolved employee reference to
/// a row that was persisted unresolved.
pub async fn attach_resolution(
    pool: &MySqlPool,
    id: u64,
    employee_id: u64,
    method: ResolutionMethod,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE device_attendance
        SET employee_id = ?, resolution = ?
        WHERE id = ? AND employee_id IS NULL
        "#,
    )
    .bind(employee_id)
    .bind(method)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
