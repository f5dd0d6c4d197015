//! Log retention
//!
//! Periodic sweep that expires chat logs and system logs once they fall out
//! of their retention windows.

use crate::config::RetentionConfig;
use crate::db::repositories::LogRepository;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Rows removed by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub chat_logs: u64,
    pub system_logs: u64,
}

#[derive(Clone)]
pub struct RetentionService {
    logs: Arc<dyn LogRepository>,
    chat_window: Duration,
    system_window: Duration,
    interval: std::time::Duration,
}

impl RetentionService {
    pub fn new(config: &RetentionConfig, logs: Arc<dyn LogRepository>) -> Self {
        Self {
            logs,
            chat_window: Duration::days(config.chat_log_days),
            system_window: Duration::days(config.system_log_days),
            interval: std::time::Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }

    /// Delete rows older than their window, measured from `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        Ok(SweepReport {
            chat_logs: self.logs.purge_chats_before(now - self.chat_window).await?,
            system_logs: self.logs.purge_system_before(now - self.system_window).await?,
        })
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Run the sweep on an interval for the life of the process
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                match self.sweep().await {
                    Ok(report) if report != SweepReport::default() => {
                        tracing::info!(
                            "Retention sweep removed {} chat logs, {} system logs",
                            report.chat_logs,
                            report.system_logs
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Retention sweep failed: {:#}", e),
                }
            }
        })
    }
}
