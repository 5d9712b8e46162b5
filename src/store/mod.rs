pub mod attendance;
pub mod employees;

use crate::model::attendance::NewAttendanceEntry;
use crate::model::employee::Employee;
use crate::model::sync_status::NewSyncStatus;
use crate::sync::ledger;
use crate::sync::orchestrator::SyncStore;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::MySqlPool;
use std::collections::HashSet;

/// Production `SyncStore` over the MySQL pool.
#[derive(Clone)]
pub struct MySqlSyncStore {
    pool: MySqlPool,
}

impl MySqlSyncStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStore for MySqlSyncStore {
    async fn load_registry(&self) -> anyhow::Result<Vec<Employee>> {
        Ok(employees::load_registry(&self.pool).await?)
    }

    async fn existing_keys(
        &self,
        dates: &[NaiveDate],
    ) -> anyhow::Result<HashSet<(NaiveDate, String, NaiveTime)>> {
        Ok(attendance::existing_keys(&self.pool, dates).await?)
    }

    async fn insert_entries(&self, entries: &[NewAttendanceEntry]) -> anyhow::Result<u64> {
        Ok(attendance::insert_entries(&self.pool, entries).await?)
    }

    async fn record_status(&self, status: &NewSyncStatus) -> anyhow::Result<()> {
        Ok(ledger::record(&self.pool, status).await?)
    }
}
