use crate::device::client::FetchWindow;
use crate::device::gateway::DeviceGateway;
use crate::model::attendance::{DedupPolicy, NewAttendanceEntry};
use crate::model::employee::Employee;
use crate::model::sync_status::NewSyncStatus;
use crate::sync::index::EmployeeIndex;
use crate::sync::normalize::{StatusRules, normalize};
use crate::sync::resolver::Resolver;
use crate::utils::attendance_cache::AttendanceCache;
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use strum_macros::Display;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// System-wide mutual exclusion for sync passes. A second trigger while
/// one pass is in flight is rejected, never queued; manual re-trigger is
/// the retry mechanism.
pub type SyncGate = Arc<Mutex<()>>;

pub static GLOBAL_SYNC_GATE: Lazy<SyncGate> = Lazy::new(|| Arc::new(Mutex::new(())));

#[derive(Debug, Error)]
#[error("a sync pass is already running")]
pub struct SyncBusy;

/// Stages of one pass, in execution order. No stage begins before the
/// previous one completes; any failure jumps straight to Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
enum SyncStage {
    Connecting,
    Fetching,
    Normalizing,
    Resolving,
    Diffing,
    Persisting,
    Done,
}

/// What the caller gets back once the pass reaches Done. Mirrors the
/// ledger row written for the pass.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub success: bool,
    pub record_count: u32,
    pub added_count: u32,
    pub message: String,
}

/// Persistence seam for a sync pass: registry feed in, attendance rows
/// and status ledger out.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn load_registry(&self) -> anyhow::Result<Vec<Employee>>;

    async fn existing_keys(
        &self,
        dates: &[NaiveDate],
    ) -> anyhow::Result<HashSet<(NaiveDate, String, NaiveTime)>>;

    async fn insert_entries(&self, entries: &[NewAttendanceEntry]) -> anyhow::Result<u64>;

    async fn record_status(&self, status: &NewSyncStatus) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: SyncStore + ?Sized> SyncStore for Arc<T> {
    async fn load_registry(&self) -> anyhow::Result<Vec<Employee>> {
        self.as_ref().load_registry().await
    }

    async fn existing_keys(
        &self,
        dates: &[NaiveDate],
    ) -> anyhow::Result<HashSet<(NaiveDate, String, NaiveTime)>> {
        self.as_ref().existing_keys(dates).await
    }

    async fn insert_entries(&self, entries: &[NewAttendanceEntry]) -> anyhow::Result<u64> {
        self.as_ref().insert_entries(entries).await
    }

    async fn record_status(&self, status: &NewSyncStatus) -> anyhow::Result<()> {
        self.as_ref().record_status(status).await
    }
}

pub struct SyncOrchestrator<S: SyncStore> {
    gateway: DeviceGateway,
    store: S,
    cache: AttendanceCache,
    gate: SyncGate,
    policy: DedupPolicy,
    rules: StatusRules,
    window_days: i64,
}

impl<S: SyncStore> SyncOrchestrator<S> {
    pub fn new(
        gateway: DeviceGateway,
        store: S,
        cache: AttendanceCache,
        gate: SyncGate,
        policy: DedupPolicy,
        rules: StatusRules,
        window_days: i64,
    ) -> Self {
        Self {
            gateway,
            store,
            cache,
            gate,
            policy,
            rules,
            window_days,
        }
    }

    /// One full pass. Returns `Err(SyncBusy)` without touching anything
    /// if another pass holds the gate. Every other outcome, success or
    /// failure, ends with a fresh ledger row.
    pub async fn run(&self) -> Result<SyncOutcome, SyncBusy> {
        let Ok(_guard) = self.gate.try_lock() else {
            warn!("sync trigger rejected, a pass is already in flight");
            return Err(SyncBusy);
        };

        let run_at = Local::now().naive_local();
        let endpoint = self.gateway.endpoint();
        info!(endpoint = %endpoint, policy = %self.policy, "sync pass starting");

        let mut stage = SyncStage::Connecting;
        debug!(stage = %stage, "entering stage");
        let window = FetchWindow::last_days(self.window_days);
        stage = SyncStage::Fetching;
        debug!(stage = %stage, "entering stage");
        let punches = match self.gateway.fetch_punches(&window).await {
            Ok(p) => p,
            // Device errors are preserved verbatim in the ledger message.
            Err(e) => return Ok(self.finish(run_at, false, 0, 0, e.to_string()).await),
        };
        let record_count = punches.len() as u32;

        stage = SyncStage::Normalizing;
        debug!(stage = %stage, punches = punches.len(), "entering stage");
        let normalized = normalize(&punches, self.policy, &self.rules);

        stage = SyncStage::Resolving;
        debug!(stage = %stage, entries = normalized.entries.len(), "entering stage");
        let registry = match self.store.load_registry().await {
            Ok(r) => r,
            Err(e) => {
                let msg = format!("registry load failed: {e}");
                return Ok(self.finish(run_at, false, record_count, 0, msg).await);
            }
        };
        let index = EmployeeIndex::build(registry);
        if index.is_empty() {
            warn!("employee registry is empty, every punch will persist unresolved");
        } else {
            debug!(employees = index.len(), "registry snapshot built");
        }
        let mut resolver = Resolver::new();
        let entries: Vec<NewAttendanceEntry> = normalized
            .entries
            .iter()
            .map(|p| {
                let resolution =
                    resolver.resolve(&p.device_user_id, p.employee_no.as_deref(), &index);
                NewAttendanceEntry {
                    date: p.date,
                    device_user_id: p.device_user_id.clone(),
                    employee_no: p.employee_no.clone(),
                    time_in: p.time_in,
                    status: p.status,
                    employee_id: resolution.employee.map(|e| e.id),
                    resolution: resolution.method,
                    synced_at: run_at,
                }
            })
            .collect();

        stage = SyncStage::Diffing;
        debug!(stage = %stage, "entering stage");
        let dates: Vec<NaiveDate> = entries
            .iter()
            .map(|e| e.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let existing = match self.store.existing_keys(&dates).await {
            Ok(k) => k,
            Err(e) => {
                let msg = format!("diff lookup failed: {e}");
                return Ok(self.finish(run_at, false, record_count, 0, msg).await);
            }
        };
        let fresh: Vec<NewAttendanceEntry> = entries
            .into_iter()
            .filter(|e| !existing.contains(&e.key()))
            .collect();

        stage = SyncStage::Persisting;
        debug!(stage = %stage, new_rows = fresh.len(), "entering stage");
        let added = match self.store.insert_entries(&fresh).await {
            Ok(n) => n as u32,
            Err(e) => {
                let msg = format!("persistence failed: {e}");
                return Ok(self.finish(run_at, false, record_count, 0, msg).await);
            }
        };

        // Served entries for every touched date are stale now.
        self.cache.invalidate_all();

        let message = format!(
            "synced {record_count} punches ({} duplicates discarded), {added} new rows; resolution: {}",
            normalized.discarded,
            resolver.stats()
        );
        Ok(self.finish(run_at, true, record_count, added, message).await)
    }

    async fn finish(
        &self,
        run_at: NaiveDateTime,
        success: bool,
        record_count: u32,
        added_count: u32,
        message: String,
    ) -> SyncOutcome {
        let stage = SyncStage::Done;
        let status = NewSyncStatus {
            run_at,
            success,
            record_count,
            added_count,
            message: message.clone(),
            device_endpoint: self.gateway.endpoint(),
        };
        // The ledger row is written for failures too; the dashboard always
        // sees a fresh status.
        if let Err(e) = self.store.record_status(&status).await {
            error!(error = %e, "failed to record sync status");
        }
        if success {
            info!(stage = %stage, record_count, added_count, "sync pass finished");
        } else {
            warn!(stage = %stage, message = %message, "sync pass failed");
        }
        SyncOutcome {
            success,
            record_count,
            added_count,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncOrchestrator, SyncStore};
    use crate::device::gateway::DeviceGateway;
    use crate::device::gateway::tests::{ScriptedConnector, punch};
    use crate::model::attendance::{
        AttendanceStatus, DedupPolicy, NewAttendanceEntry, ResolutionMethod,
    };
    use crate::model::employee::Employee;
    use crate::model::sync_status::NewSyncStatus;
    use crate::sync::index::tests::employee;
    use crate::sync::normalize::StatusRules;
    use crate::utils::attendance_cache::AttendanceCache;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        registry: Vec<Employee>,
        rows: StdMutex<Vec<NewAttendanceEntry>>,
        statuses: StdMutex<Vec<NewSyncStatus>>,
        fail_insert: bool,
    }

    #[async_trait]
    impl SyncStore for MemStore {
        async fn load_registry(&self) -> anyhow::Result<Vec<Employee>> {
            Ok(self.registry.clone())
        }

        async fn existing_keys(
            &self,
            dates: &[NaiveDate],
        ) -> anyhow::Result<HashSet<(NaiveDate, String, NaiveTime)>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| dates.contains(&r.date))
                .map(|r| r.key())
                .collect())
        }

        async fn insert_entries(&self, entries: &[NewAttendanceEntry]) -> anyhow::Result<u64> {
            if self.fail_insert {
                anyhow::bail!("table is full");
            }
            self.rows.lock().unwrap().extend_from_slice(entries);
            Ok(entries.len() as u64)
        }

        async fn record_status(&self, status: &NewSyncStatus) -> anyhow::Result<()> {
            self.statuses.lock().unwrap().push(status.clone());
            Ok(())
        }
    }

    fn orchestrator(
        connector: ScriptedConnector,
        store: Arc<MemStore>,
        timeout: Duration,
    ) -> SyncOrchestrator<Arc<MemStore>> {
        SyncOrchestrator::new(
            DeviceGateway::new(Arc::new(connector), timeout),
            store,
            AttendanceCache::new(),
            Arc::new(Mutex::new(())),
            DedupPolicy::OnePerEmployeePerDay,
            StatusRules::default(),
            7,
        )
    }

    fn day_punches() -> Vec<crate::device::client::RawPunch> {
        vec![
            punch("7", "2024-01-10 08:59:00"),
            punch("7", "2024-01-10 09:15:00"),
        ]
    }

    #[tokio::test]
    async fn repeated_pass_over_unchanged_window_adds_nothing() {
        let store = Arc::new(MemStore {
            registry: vec![employee(7, "7", None, "seven@x.com")],
            ..MemStore::default()
        });

        let orch = orchestrator(
            ScriptedConnector::serving(day_punches()),
            store.clone(),
            Duration::from_secs(5),
        );
        let first = orch.run().await.expect("gate free");
        assert!(first.success);
        assert_eq!(first.record_count, 2);
        assert_eq!(first.added_count, 1);

        let second = orch.run().await.expect("gate free");
        assert!(second.success);
        assert_eq!(second.added_count, 0);
        assert_eq!(store.rows.lock().unwrap().len(), 1);
        assert_eq!(store.statuses.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn resolved_punch_persists_with_method_and_status() {
        let store = Arc::new(MemStore {
            registry: vec![employee(7, "7", None, "seven@x.com")],
            ..MemStore::default()
        });
        let orch = orchestrator(
            ScriptedConnector::serving(day_punches()),
            store.clone(),
            Duration::from_secs(5),
        );
        orch.run().await.expect("gate free");

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.time_in, NaiveTime::from_hms_opt(8, 59, 0).unwrap());
        assert_eq!(row.status, AttendanceStatus::Present);
        assert_eq!(row.employee_id, Some(7));
        assert_eq!(row.resolution, ResolutionMethod::DirectIdMap);
    }

    #[tokio::test]
    async fn unmatched_early_punch_is_kept_visible() {
        let store = Arc::new(MemStore::default());
        let orch = orchestrator(
            ScriptedConnector::serving(vec![punch("999", "2024-01-10 02:10:00")]),
            store.clone(),
            Duration::from_secs(5),
        );
        let outcome = orch.run().await.expect("gate free");
        assert!(outcome.success);

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttendanceStatus::EarlyMorning);
        assert_eq!(rows[0].employee_id, None);
        assert_eq!(rows[0].resolution, ResolutionMethod::None);
    }

    #[tokio::test]
    async fn device_timeout_fails_the_pass_and_leaves_rows_untouched() {
        let store = Arc::new(MemStore::default());
        let connector = ScriptedConnector {
            punches: day_punches(),
            delay: Duration::from_millis(200),
            refuse_connect: false,
        };
        let orch = orchestrator(connector, store.clone(), Duration::from_millis(20));

        let outcome = orch.run().await.expect("gate free");
        assert!(!outcome.success);
        assert!(outcome.message.contains("timed out"));
        assert!(store.rows.lock().unwrap().is_empty());

        let statuses = store.statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].success);
    }

    #[tokio::test]
    async fn persistence_failure_is_recorded_verbatim() {
        let store = Arc::new(MemStore {
            fail_insert: true,
            ..MemStore::default()
        });
        let orch = orchestrator(
            ScriptedConnector::serving(day_punches()),
            store.clone(),
            Duration::from_secs(5),
        );

        let outcome = orch.run().await.expect("gate free");
        assert!(!outcome.success);
        assert!(outcome.message.contains("persistence failed"));
        assert!(outcome.message.contains("table is full"));

        let statuses = store.statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].message, outcome.message);
    }

    #[tokio::test]
    async fn second_trigger_is_rejected_while_gate_is_held() {
        let store = Arc::new(MemStore::default());
        let gate = Arc::new(Mutex::new(()));
        let orch = SyncOrchestrator::new(
            DeviceGateway::new(
                Arc::new(ScriptedConnector::serving(vec![])),
                Duration::from_secs(5),
            ),
            store,
            AttendanceCache::new(),
            gate.clone(),
            DedupPolicy::OnePerEmployeePerDay,
            StatusRules::default(),
            7,
        );

        let _held = gate.try_lock().expect("free");
        assert!(orch.run().await.is_err());
    }
}
