use crate::device::client::RawPunch;
use crate::model::attendance::{AttendanceEntry, AttendanceStatus, DedupPolicy};
use chrono::{NaiveDate, NaiveTime, Timelike};
use std::collections::BTreeMap;

/// Thresholds for status derivation. Both are deployment-specific, so
/// they come from configuration rather than being baked in.
#[derive(Debug, Clone, Copy)]
pub struct StatusRules {
    /// Local hours `[0, end)` are flagged early-morning.
    pub early_morning_end_hour: u32,
    /// Punches strictly after this local time are late.
    pub late_after: NaiveTime,
}

impl Default for StatusRules {
    fn default() -> Self {
        Self {
            early_morning_end_hour: 6,
            late_after: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        }
    }
}

/// One punch after day-grouping and dedup, not yet resolved or persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPunch {
    pub date: NaiveDate,
    pub device_user_id: String,
    pub employee_no: Option<String>,
    pub time_in: NaiveTime,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSet {
    pub entries: Vec<NormalizedPunch>,
    /// Punches dropped by dedup, kept for the status message.
    pub discarded: usize,
}

/// Early-morning wins over late: a 02:00 punch on a device whose clock
/// rolled past midnight must surface for audit, not hide behind "late".
pub fn derive_status(time_in: NaiveTime, rules: &StatusRules) -> AttendanceStatus {
    if time_in.hour() < rules.early_morning_end_hour {
        AttendanceStatus::EarlyMorning
    } else if time_in > rules.late_after {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Groups raw punches by calendar day (device-local timestamps, so the
/// device's day boundary) and device user, then applies the dedup policy.
///
/// Pure and deterministic: output is sorted by (date, device_user_id,
/// time_in) and identical for identical input, which the query cache and
/// idempotent re-sync both rely on. Exact duplicate timestamps for the
/// same user collapse under either policy.
pub fn normalize(punches: &[RawPunch], policy: DedupPolicy, rules: &StatusRules) -> NormalizedSet {
    let mut groups: BTreeMap<(NaiveDate, String), Vec<&RawPunch>> = BTreeMap::new();
    for punch in punches {
        groups
            .entry((punch.timestamp.date(), punch.device_user_id.clone()))
            .or_default()
            .push(punch);
    }

    let mut entries = Vec::new();
    let mut discarded = 0usize;

    for ((date, device_user_id), mut group) in groups {
        group.sort_by_key(|p| p.timestamp);
        match policy {
            DedupPolicy::OnePerEmployeePerDay => {
                let first = group[0];
                discarded += group.len() - 1;
                entries.push(entry_from(date, &device_user_id, first, rules));
            }
            DedupPolicy::AllPunches => {
                let mut last_time: Option<NaiveTime> = None;
                for punch in group {
                    let time_in = punch.timestamp.time();
                    if last_time == Some(time_in) {
                        discarded += 1;
                        continue;
                    }
                    last_time = Some(time_in);
                    entries.push(entry_from(date, &device_user_id, punch, rules));
                }
            }
        }
    }

    NormalizedSet { entries, discarded }
}

fn entry_from(
    date: NaiveDate,
    device_user_id: &str,
    punch: &RawPunch,
    rules: &StatusRules,
) -> NormalizedPunch {
    NormalizedPunch {
        date,
        device_user_id: device_user_id.to_string(),
        employee_no: punch.employee_no.clone(),
        time_in: punch.timestamp.time(),
        status: derive_status(punch.timestamp.time(), rules),
    }
}

/// Read-side shaping: collapse already-persisted rows to the earliest per
/// (date, device user). Lets a one-per-day query stay correct even when
/// rows were synced under the all-punches policy.
pub fn collapse_one_per_day(mut entries: Vec<AttendanceEntry>) -> Vec<AttendanceEntry> {
    entries.sort_by(|a, b| {
        (a.date, &a.device_user_id, a.time_in).cmp(&(b.date, &b.device_user_id, b.time_in))
    });
    entries.dedup_by(|next, kept| next.date == kept.date && next.device_user_id == kept.device_user_id);
    entries
}
