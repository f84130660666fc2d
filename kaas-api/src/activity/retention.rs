//! Periodic pruning of the activity trail

use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use super::ActivityLog;
use crate::config::ActivityConfig;

/// Background sweep deleting activity entries past the retention window
pub struct RetentionWorker {
    log: ActivityLog,
    retention_days: i64,
    interval: Duration,
}

impl RetentionWorker {
    pub fn new(log: ActivityLog, config: &ActivityConfig) -> Self {
        Self {
            log,
            retention_days: config.retention_days,
            interval: config.cleanup_interval(),
        }
    }

    /// Run one sweep, logging rather than returning failures
    pub async fn sweep(&self) -> u64 {
        match self.log.cleanup_older_than(self.retention_days).await {
            Ok(removed) => removed,
            Err(e) => {
                error!(retention_days = self.retention_days, "Activity retention sweep failed: {}", e);
                0
            }
        }
    }

    /// Sweep on every tick until the shutdown channel flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            retention_days = self.retention_days,
            interval_secs = self.interval.as_secs(),
            "Activity retention worker started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
        }

        info!("Activity retention worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let db = memory_db().await;
        let config = ActivityConfig {
            retention_days: 30,
            cleanup_interval_secs: 3600,
        };
        let worker = RetentionWorker::new(ActivityLog::new(db.pool().clone()), &config);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_on_empty_log() {
        let db = memory_db().await;
        let worker = RetentionWorker::new(ActivityLog::new(db.pool().clone()), &ActivityConfig::default());
        assert_eq!(worker.sweep().await, 0);
    }
}
