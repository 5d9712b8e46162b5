use crate::model::attendance::DedupPolicy;
use crate::sync::normalize::StatusRules;
use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,

    // Terminal endpoint
    pub device_host: String,
    pub device_port: u16,
    pub device_timeout_secs: u64,

    // Sync behavior
    pub sync_window_days: i64,
    pub dedup_policy: DedupPolicy,
    pub early_morning_end_hour: u32,
    pub late_after: NaiveTime,

    // Rate limiting
    pub rate_sync_per_min: u32,
    pub rate_query_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            device_host: env::var("DEVICE_HOST").expect("DEVICE_HOST must be set"),
            device_port: env::var("DEVICE_PORT")
                .unwrap_or_else(|_| "4370".to_string())
                .parse()
                .unwrap(),
            device_timeout_secs: env::var("DEVICE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string()) // terminals are slow over LAN/WAN
                .parse()
                .unwrap(),

            sync_window_days: env::var("SYNC_WINDOW_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap(),
            dedup_policy: DedupPolicy::from_str(
                &env::var("DEDUP_POLICY").unwrap_or_else(|_| "one-per-employee-per-day".to_string()),
            )
            .expect("DEDUP_POLICY must be one-per-employee-per-day or all-punches"),
            early_morning_end_hour: env::var("EARLY_MORNING_END_HOUR")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap(),
            late_after: NaiveTime::parse_from_str(
                &env::var("LATE_AFTER").unwrap_or_else(|_| "09:00".to_string()),
                "%H:%M",
            )
            .expect("LATE_AFTER must be HH:MM"),

            rate_sync_per_min: env::var("RATE_SYNC_PER_MIN")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap(),
            rate_query_per_min: env::var("RATE_QUERY_PER_MIN")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
        }
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout_secs)
    }

    pub fn status_rules(&self) -> StatusRules {
        StatusRules {
            early_morning_end_hour: self.early_morning_end_hour,
            late_after: self.late_after,
        }
    }
}
