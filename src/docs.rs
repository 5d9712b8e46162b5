use crate::api::attendance::AttendanceListResponse;
use crate::api::sync::{DeviceTimeResponse, DeviceUserListResponse, SyncRunResponse};
use crate::device::client::DeviceUser;
use crate::model::attendance::{AttendanceEntry, AttendanceStatus, DedupPolicy, ResolutionMethod};
use crate::model::sync_status::SyncStatus;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Sync API",
        version = "1.0.0",
        description = r#"
## Attendance Synchronization & Identity Reconciliation

This API pulls raw punch events off a biometric terminal, matches each punch
to an employee record, deduplicates repeated same-day punches, and serves a
stable daily attendance set.

### 🔹 Key Features
- **Sync**
  - Trigger a full sync pass; inspect the latest status and history
- **Attendance**
  - Query daily attendance under either dedup policy, cache-backed
- **Device**
  - Audit the terminal's enrollment listing

### 🔄 Sync semantics
Re-running a pass over an unchanged device window adds zero rows; failed
passes leave persisted attendance untouched and are recorded in the ledger.

### 📦 Response Format
- JSON-based RESTful responses

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::list_attendance,

        crate::api::sync::run_sync,
        crate::api::sync::sync_status,
        crate::api::sync::sync_history,
        crate::api::sync::device_users,
        crate::api::sync::device_time
    ),
    components(
        schemas(
            AttendanceEntry,
            AttendanceStatus,
            DedupPolicy,
            ResolutionMethod,
            AttendanceListResponse,
            SyncStatus,
            SyncRunResponse,
            DeviceUser,
            DeviceUserListResponse,
            DeviceTimeResponse
        )
    ),
    tags(
        (name = "Sync", description = "Device synchronization APIs"),
        (name = "Attendance", description = "Attendance query APIs"),
        (name = "Device", description = "Terminal audit APIs"),
    )
)]
pub struct ApiDoc;
