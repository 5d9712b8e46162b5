use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row per sync attempt, written whether the pass succeeded or not.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "run_at": "2024-01-10T10:00:00",
        "success": true,
        "record_count": 120,
        "added_count": 3,
        "message": "synced 120 punches, 3 new (direct-id-map: 115, contact-map: 2, none: 3)",
        "device_endpoint": "192.168.1.201:4370"
    })
)]
pub struct SyncStatus {
    #[schema(example = 42)]
    pub id: u64,

    #[schema(example = "2024-01-10T10:00:00", value_type = String, format = "date-time")]
    pub run_at: NaiveDateTime,

    pub success: bool,

    /// Punches obtained from the device this pass.
    #[schema(example = 120)]
    pub record_count: u32,

    /// Rows actually inserted after diffing.
    #[schema(example = 3)]
    pub added_count: u32,

    /// Human-readable outcome; device errors are preserved verbatim.
    #[schema(example = "synced 120 punches, 3 new")]
    pub message: String,

    #[schema(example = "192.168.1.201:4370")]
    pub device_endpoint: String,
}

/// A status row about to be recorded; the id is assigned by the database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncStatus {
    pub run_at: NaiveDateTime,
    pub success: bool,
    pub record_count: u32,
    pub added_count: u32,
    pub message: String,
    pub device_endpoint: String,
}
