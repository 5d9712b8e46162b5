use crate::model::attendance::{AttendanceEntry, DedupPolicy};
use crate::store;
use crate::sync::normalize::collapse_one_per_day;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use moka::future::Cache;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

/// Process-local read cache for daily attendance, keyed by
/// (date, dedup policy) — results differ materially by policy, so a
/// policy toggle must never serve the other policy's entries.
///
/// Correctness comes from explicit wholesale invalidation after each sync
/// pass; the TTL is only a safety ceiling. Values are shared slices, so a
/// reader concurrent with an invalidation sees either the old complete
/// list or the new complete list, never a torn one.
#[derive(Clone)]
pub struct AttendanceCache {
    inner: Cache<(NaiveDate, DedupPolicy), Arc<Vec<AttendanceEntry>>>,
}

impl AttendanceCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(4_096)
                .time_to_live(Duration::from_secs(86400)) // 24h safety ceiling
                .build(),
        }
    }

    pub async fn get(
        &self,
        date: NaiveDate,
        policy: DedupPolicy,
    ) -> Option<Arc<Vec<AttendanceEntry>>> {
        self.inner.get(&(date, policy)).await
    }

    pub async fn put(&self, date: NaiveDate, policy: DedupPolicy, entries: Vec<AttendanceEntry>) {
        self.inner.insert((date, policy), Arc::new(entries)).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

impl Default for AttendanceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Prime the cache with RECENT days under the active policy so the first
/// dashboard loads after startup skip the database.
pub async fn warmup_attendance_cache(
    pool: &MySqlPool,
    cache: &AttendanceCache,
    policy: DedupPolicy,
    days: u32,
) -> Result<()> {
    let today = Local::now().date_naive();
    let mut total = 0usize;
    let mut puts = Vec::with_capacity(days as usize);

    for offset in 0..days {
        let date = today - chrono::Duration::days(offset as i64);
        let mut entries = store::attendance::for_date(pool, date).await?;
        if policy == DedupPolicy::OnePerEmployeePerDay {
            entries = collapse_one_per_day(entries);
        }
        total += entries.len();
        puts.push(cache.put(date, policy, entries));
    }

    // Await all insertions concurrently
    futures::future::join_all(puts).await;

    log::info!(
        "Attendance cache warmup complete: {} entries (last {} days)",
        total,
        days
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::AttendanceCache;
    use crate::model::attendance::{
        AttendanceEntry, AttendanceStatus, DedupPolicy, ResolutionMethod,
    };
    use chrono::{NaiveDate, NaiveDateTime};

    fn entry(user: &str) -> AttendanceEntry {
        AttendanceEntry {
            id: 1,
            date: date(),
            device_user_id: user.to_string(),
            employee_no: None,
            time_in: "08:59:00".parse().expect("time"),
            status: AttendanceStatus::Present,
            employee_id: None,
            resolution: ResolutionMethod::None,
            synced_at: NaiveDateTime::parse_from_str("2024-01-10 10:00:00", "%Y-%m-%d %H:%M:%S")
                .expect("ts"),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).expect("date")
    }

    #[tokio::test]
    async fn put_then_get_returns_the_same_entries() {
        let cache = AttendanceCache::new();
        cache
            .put(date(), DedupPolicy::OnePerEmployeePerDay, vec![entry("7")])
            .await;

        let hit = cache
            .get(date(), DedupPolicy::OnePerEmployeePerDay)
            .await
            .expect("hit");
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].device_user_id, "7");
    }

    #[tokio::test]
    async fn other_policy_is_a_miss_for_the_same_date() {
        let cache = AttendanceCache::new();
        cache
            .put(date(), DedupPolicy::OnePerEmployeePerDay, vec![entry("7")])
            .await;

        assert!(cache.get(date(), DedupPolicy::AllPunches).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_all_clears_every_key() {
        let cache = AttendanceCache::new();
        cache
            .put(date(), DedupPolicy::OnePerEmployeePerDay, vec![entry("7")])
            .await;
        cache
            .put(date(), DedupPolicy::AllPunches, vec![entry("7"), entry("8")])
            .await;

        cache.invalidate_all();

        assert!(
            cache
                .get(date(), DedupPolicy::OnePerEmployeePerDay)
                .await
                .is_none()
        );
        assert!(cache.get(date(), DedupPolicy::AllPunches).await.is_none());
    }
}
