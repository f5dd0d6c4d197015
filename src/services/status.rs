//! System status
//!
//! Record counts across the fixture store plus process figures: uptime,
//! request count, average latency and memory.

use crate::db::repositories::{
    FloatRepository, KnowledgeRepository, LogRepository, ProfileRepository, UserRepository,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

/// Traffic counters behind the status page, fed by the request-stats
/// middleware. Failed means a 5xx response.
#[derive(Debug)]
pub struct RequestStats {
    started: Instant,
    served: AtomicU64,
    failed: AtomicU64,
    busy_us: AtomicU64,
}

/// Traffic figures as reported under `system`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSummary {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub avg_response_time_ms: f64,
    pub uptime_seconds: u64,
    pub uptime_formatted: String,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            served: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            busy_us: AtomicU64::new(0),
        }
    }

    pub fn record(&self, elapsed: Duration, failed: bool) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.served.fetch_add(1, Ordering::Relaxed);
        self.busy_us.fetch_add(micros, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn summary(&self) -> TrafficSummary {
        summarize(
            self.served.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            Duration::from_micros(self.busy_us.load(Ordering::Relaxed)),
            self.started.elapsed(),
        )
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(served: u64, failed: u64, busy: Duration, uptime: Duration) -> TrafficSummary {
    let avg_response_time_ms = match served {
        0 => 0.0,
        n => busy.as_secs_f64() * 1000.0 / n as f64,
    };

    let seconds = uptime.as_secs();
    let (days, hours, minutes) = (seconds / 86400, seconds % 86400 / 3600, seconds % 3600 / 60);
    let uptime_formatted = match (days, hours, minutes) {
        (0, 0, 0) => format!("{}s", seconds),
        (0, 0, m) => format!("{}m", m),
        (0, h, m) => format!("{}h {}m", h, m),
        (d, h, m) => format!("{}d {}h {}m", d, h, m),
    };

    TrafficSummary {
        total_requests: served,
        failed_requests: failed,
        avg_response_time_ms,
        uptime_seconds: seconds,
        uptime_formatted,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseCounts {
    pub total_floats: i64,
    pub active_floats: i64,
    pub total_users: i64,
    pub total_profiles: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogCounts {
    pub chat_logs: i64,
    pub conversions: i64,
    pub knowledge_documents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    pub version: &'static str,
    #[serde(flatten)]
    pub traffic: TrafficSummary,
    pub memory_bytes: u64,
    pub memory_formatted: String,
    pub last_update: DateTime<Utc>,
}

/// Snapshot returned by the system-status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub database: DatabaseCounts,
    pub logs: LogCounts,
    pub system: ProcessStatus,
}

pub struct StatusService {
    floats: Arc<dyn FloatRepository>,
    profiles: Arc<dyn ProfileRepository>,
    users: Arc<dyn UserRepository>,
    logs: Arc<dyn LogRepository>,
    knowledge: Arc<dyn KnowledgeRepository>,
    stats: Arc<RequestStats>,
}

impl StatusService {
    pub fn new(
        floats: Arc<dyn FloatRepository>,
        profiles: Arc<dyn ProfileRepository>,
        users: Arc<dyn UserRepository>,
        logs: Arc<dyn LogRepository>,
        knowledge: Arc<dyn KnowledgeRepository>,
        stats: Arc<RequestStats>,
    ) -> Self {
        Self {
            floats,
            profiles,
            users,
            logs,
            knowledge,
            stats,
        }
    }

    pub async fn snapshot(&self) -> Result<SystemStatus> {
        let database = DatabaseCounts {
            total_floats: self.floats.count().await?,
            active_floats: self.floats.count_active().await?,
            total_users: self.users.count().await?,
            total_profiles: self.profiles.count().await?,
        };
        let logs = LogCounts {
            chat_logs: self.logs.count_chats().await?,
            conversions: self.logs.count_conversions().await?,
            knowledge_documents: self.knowledge.count().await?,
        };

        let memory_bytes = process_memory();

        Ok(SystemStatus {
            database,
            logs,
            system: ProcessStatus {
                version: env!("CARGO_PKG_VERSION"),
                traffic: self.stats.summary(),
                memory_bytes,
                memory_formatted: format_bytes(memory_bytes),
                last_update: Utc::now(),
            },
        })
    }
}

/// Resident memory of this process, 0 if unavailable
fn process_memory() -> u64 {
    let mut sys = System::new_all();
    sys.refresh_all();
    sys.process(Pid::from_u32(process::id()))
        .map(|p| p.memory())
        .unwrap_or(0)
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
