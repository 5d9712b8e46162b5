use crate::device::client::{DeviceUser, FetchWindow, RawPunch, TerminalConnector};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure taxonomy for one device session. Any failure means "zero
/// punches obtained"; the gateway never surfaces partial data.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device connection failed: {0}")]
    ConnectionFailed(anyhow::Error),

    #[error("device operation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("device protocol error: {0}")]
    Protocol(anyhow::Error),
}

/// Owns the lifecycle of terminal conversations: each operation is one
/// connect→operate→disconnect sequence under a hard timeout. Terminals
/// are slow over LAN/WAN, so the default budget is generous; on expiry
/// the in-flight session is dropped, which tears the connection down.
#[derive(Clone)]
pub struct DeviceGateway {
    connector: Arc<dyn TerminalConnector>,
    timeout: Duration,
}

impl DeviceGateway {
    pub fn new(connector: Arc<dyn TerminalConnector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    pub async fn fetch_punches(&self, window: &FetchWindow) -> Result<Vec<RawPunch>, DeviceError> {
        self.bounded(async {
            let mut session = self
                .connector
                .open()
                .await
                .map_err(DeviceError::ConnectionFailed)?;
            let result = session.read_punches(window).await;
            if let Err(e) = session.close().await {
                warn!(error = %e, "terminal session close failed");
            }
            let punches = result.map_err(DeviceError::Protocol)?;
            debug!(count = punches.len(), "fetched punch records");
            Ok(punches)
        })
        .await
    }

    pub async fn fetch_users(&self) -> Result<Vec<DeviceUser>, DeviceError> {
        self.bounded(async {
            let mut session = self
                .connector
                .open()
                .await
                .map_err(DeviceError::ConnectionFailed)?;
            let result = session.read_users().await;
            if let Err(e) = session.close().await {
                warn!(error = %e, "terminal session close failed");
            }
            result.map_err(DeviceError::Protocol)
        })
        .await
    }

    pub async fn device_time(&self) -> Result<NaiveDateTime, DeviceError> {
        self.bounded(async {
            let mut session = self
                .connector
                .open()
                .await
                .map_err(DeviceError::ConnectionFailed)?;
            let result = session.device_time().await;
            if let Err(e) = session.close().await {
                warn!(error = %e, "terminal session close failed");
            }
            result.map_err(DeviceError::Protocol)
        })
        .await
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, DeviceError>>,
    ) -> Result<T, DeviceError> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(DeviceError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::device::client::{TerminalConnector, TerminalSession};
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    /// Scripted stand-in for the vendor client: serves a fixed punch set,
    /// optionally after a delay, or refuses to connect at all.
    pub(crate) struct ScriptedConnector {
        pub punches: Vec<RawPunch>,
        pub delay: Duration,
        pub refuse_connect: bool,
    }

    impl ScriptedConnector {
        pub fn serving(punches: Vec<RawPunch>) -> Self {
            Self {
                punches,
                delay: Duration::ZERO,
                refuse_connect: false,
            }
        }
    }

    #[async_trait]
    impl TerminalConnector for ScriptedConnector {
        async fn open(&self) -> anyhow::Result<Box<dyn TerminalSession>> {
            if self.refuse_connect {
                bail!("connection refused");
            }
            Ok(Box::new(ScriptedSession {
                punches: self.punches.clone(),
                delay: self.delay,
            }))
        }

        fn endpoint(&self) -> String {
            "test-terminal:4370".into()
        }
    }

    struct ScriptedSession {
        punches: Vec<RawPunch>,
        delay: Duration,
    }

    #[async_trait]
    impl TerminalSession for ScriptedSession {
        async fn device_time(&mut self) -> anyhow::Result<NaiveDateTime> {
            Ok(NaiveDate::from_ymd_opt(2024, 1, 10)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap())
        }

        async fn read_users(&mut self) -> anyhow::Result<Vec<DeviceUser>> {
            Ok(vec![])
        }

        async fn read_punches(&mut self, _window: &FetchWindow) -> anyhow::Result<Vec<RawPunch>> {
            tokio::time::sleep(self.delay).await;
            Ok(self.punches.clone())
        }

        async fn close(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn punch(id: &str, ts: &str) -> RawPunch {
        RawPunch {
            device_user_id: id.to_string(),
            employee_no: None,
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").expect("timestamp"),
        }
    }

    #[tokio::test]
    async fn fetch_returns_the_session_punches() {
        let punches = vec![punch("7", "2024-01-10 08:59:00")];
        let gateway = DeviceGateway::new(
            Arc::new(ScriptedConnector::serving(punches.clone())),
            Duration::from_secs(5),
        );
        let window = FetchWindow::last_days(7);
        let got = gateway.fetch_punches(&window).await.expect("punches");
        assert_eq!(got, punches);
    }

    #[tokio::test]
    async fn slow_session_times_out() {
        let connector = ScriptedConnector {
            punches: vec![punch("7", "2024-01-10 08:59:00")],
            delay: Duration::from_millis(200),
            refuse_connect: false,
        };
        let gateway = DeviceGateway::new(Arc::new(connector), Duration::from_millis(20));
        let window = FetchWindow::last_days(7);
        match gateway.fetch_punches(&window).await {
            Err(DeviceError::Timeout { .. }) => {}
            other => panic!("expected timeout, got {:?}", other.map(|p| p.len())),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_connection_failure() {
        let connector = ScriptedConnector {
            punches: vec![],
            delay: Duration::ZERO,
            refuse_connect: true,
        };
        let gateway = DeviceGateway::new(Arc::new(connector), Duration::from_secs(1));
        match gateway.fetch_users().await {
            Err(DeviceError::ConnectionFailed(_)) => {}
            other => panic!("expected connection failure, got {:?}", other.map(|u| u.len())),
        }
    }
}
