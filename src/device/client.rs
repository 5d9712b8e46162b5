use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One device-reported clock-in event, exactly as the terminal handed it
/// over. Identifiers are already in canonical string form; the transport
/// adapter coerces numeric payloads before they get here.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPunch {
    pub device_user_id: String,
    pub employee_no: Option<String>,
    pub timestamp: NaiveDateTime,
}

/// An enrollment record on the terminal, used for operator audit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "device_user_id": "7",
        "name": "John Doe",
        "card_no": "0012345"
    })
)]
pub struct DeviceUser {
    #[schema(example = "7")]
    pub device_user_id: String,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "0012345", nullable = true)]
    pub card_no: Option<String>,
}

/// Device-local time range for a punch fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl FetchWindow {
    /// Window covering the last `days` days up to now, in local time.
    /// Terminals retain bounded history and the diff step makes
    /// overlapping windows safe to re-fetch.
    pub fn last_days(days: i64) -> Self {
        let now = Local::now().naive_local();
        Self {
            from: now - Duration::days(days),
            to: now,
        }
    }
}

/// Opens sessions against the terminal. One session per gateway operation;
/// the connector itself holds no connection state.
#[async_trait]
pub trait TerminalConnector: Send + Sync {
    async fn open(&self) -> anyhow::Result<Box<dyn TerminalSession>>;

    /// `host:port` the connector dials, for the status ledger.
    fn endpoint(&self) -> String;
}

/// A live terminal conversation. Dropping the session tears the
/// connection down; `close` is the polite variant.
#[async_trait]
pub trait TerminalSession: Send {
    async fn device_time(&mut self) -> anyhow::Result<NaiveDateTime>;

    async fn read_users(&mut self) -> anyhow::Result<Vec<DeviceUser>>;

    async fn read_punches(&mut self, window: &FetchWindow) -> anyhow::Result<Vec<RawPunch>>;

    async fn close(&mut self) -> anyhow::Result<()>;
}
