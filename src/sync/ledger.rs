use crate::model::sync_status::{NewSyncStatus, SyncStatus};
use sqlx::MySqlPool;

/// Durable record of sync attempts. Append-only; "latest" is the max-id
/// row. The orchestrator is the only writer (enforced by the sync gate),
/// everything else polls `latest`.
pub async fn record(pool: &MySqlPool, status: &NewSyncStatus) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sync_status
        (run_at, success, record_count, added_count, message, device_endpoint)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(status.run_at)
    .bind(status.success)
    .bind(status.record_count)
    .bind(status.added_count)
    .bind(&status.message)
    .bind(&status.device_endpoint)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn latest(pool: &MySqlPool) -> Result<Option<SyncStatus>, sqlx::Error> {
    sqlx::query_as::<_, SyncStatus>(
        r#"
        SELECT id, run_at, success, record_count, added_count, message, device_endpoint
        FROM sync_status
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await
}

pub async fn history(pool: &MySqlPool, limit: u32) -> Result<Vec<SyncStatus>, sqlx::Error> {
    sqlx::query_as::<_, SyncStatus>(
        r#"
        SELECT id, run_at, success, record_count, added_count, message, device_endpoint
        FROM sync_status
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
