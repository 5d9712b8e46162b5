use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// How repeated same-day punches are collapsed into attendance rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DedupPolicy {
    /// Keep the earliest punch per employee per calendar day.
    OnePerEmployeePerDay,
    /// Keep every punch as its own row.
    AllPunches,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Late,
    /// Punch landed in the configured very-early-morning window. Advisory
    /// flag so operators can audit device clock rollover, not an error.
    EarlyMorning,
}

/// Which resolution strategy matched a punch to an employee.
/// `None` means the row is unresolved and `employee_id` is null.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    DirectIdMap,
    EmployeeNoIdMap,
    ContactMap,
    IdScan,
    ContactScan,
    None,
}

/// One persisted daily attendance record pulled off the terminal.
/// Insert-only; the sole permitted update is attaching a late-resolved
/// employee reference.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 10,
        "date": "2024-01-10",
        "device_user_id": "7",
        "employee_no": "EMP-007",
        "time_in": "08:59:00",
        "status": "present",
        "employee_id": 7,
        "resolution": "direct-id-map",
        "synced_at": "2024-01-10T10:00:00"
    })
)]
pub struct AttendanceEntry {
    #[schema(example = 10)]
    pub id: u64,

    #[schema(example = "2024-01-10", value_type = String, format = "date")]
    pub date: NaiveDate,

    /// Device-assigned identifier, canonical string form.
    #[schema(example = "7")]
    pub device_user_id: String,

    /// Secondary identifier as reported by the device, if any.
    #[schema(example = "EMP-007", nullable = true)]
    pub employee_no: Option<String>,

    #[schema(example = "08:59:00", value_type = String, format = "time")]
    pub time_in: NaiveTime,

    pub status: AttendanceStatus,

    /// Null until some resolution pass matches the punch to the registry.
    #[schema(example = 7, nullable = true)]
    pub employee_id: Option<u64>,

    pub resolution: ResolutionMethod,

    #[schema(example = "2024-01-10T10:00:00", value_type = String, format = "date-time")]
    pub synced_at: NaiveDateTime,
}

/// An attendance row about to be persisted; the id is assigned by the
/// database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceEntry {
    pub date: NaiveDate,
    pub device_user_id: String,
    pub employee_no: Option<String>,
    pub time_in: NaiveTime,
    pub status: AttendanceStatus,
    pub employee_id: Option<u64>,
    pub resolution: ResolutionMethod,
    pub synced_at: NaiveDateTime,
}

impl NewAttendanceEntry {
    /// Diff identity: two rows with the same key are the same punch.
    pub fn key(&self) -> (NaiveDate, String, NaiveTime) {
        (self.date, self.device_user_id.clone(), self.time_in)
    }
}
