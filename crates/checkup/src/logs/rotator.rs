//! Periodic rotation of active audit logs.
//!
//! On every period each active log is compressed into
//! `<logId>-<epochMillis>.gz.b64` and then emptied in place.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::LogStore;

/// Counts of one rotation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSummary {
    pub rotated: usize,
    pub failed: usize,
}

/// Rotation manager for the audit logs
pub struct LogRotator {
    logs: Arc<dyn LogStore>,
    period: Duration,
}

impl LogRotator {
    pub fn new(logs: Arc<dyn LogStore>, period: Duration) -> Self {
        Self { logs, period }
    }

    /// Rotated log id for `log_id` at the current time
    pub fn rotated_id(log_id: &str) -> String {
        format!("{}-{}", log_id, chrono::Utc::now().timestamp_millis())
    }

    /// Rotate every active log once
    pub async fn rotate_all(&self) -> RotationSummary {
        let mut summary = RotationSummary::default();

        let log_ids = match self.logs.list(false).await {
            Ok(log_ids) => log_ids,
            Err(e) => {
                warn!("Failed to list logs for rotation: {}", e);
                return summary;
            }
        };

        if log_ids.is_empty() {
            debug!("No logs to rotate");
            return summary;
        }

        for log_id in log_ids {
            let new_id = Self::rotated_id(&log_id);
            match self.logs.rotate(&log_id, &new_id).await {
                Ok(()) => {
                    debug!(log_id = %log_id, rotated_to = %new_id, "Log rotated");
                    summary.rotated += 1;
                }
                Err(e) => {
                    warn!(log_id = %log_id, "Log rotation failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!("Log rotation completed: {} rotated, {} failed", summary.rotated, summary.failed);
        summary
    }

    /// Start the background rotation task. The first pass runs immediately.
    pub fn start(self, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(self.period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Log rotator started (period: {:?})", self.period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Log rotator stopped");
                        break;
                    }
                    _ = timer.tick() => {
                        self.rotate_all().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::FileLogStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rotate_all() {
        let dir = tempdir().unwrap();
        let logs = Arc::new(FileLogStore::new(dir.path()));
        logs.append("one", "a").await.unwrap();
        logs.append("two", "b").await.unwrap();

        let rotator = LogRotator::new(logs.clone(), Duration::from_secs(3600));
        let summary = rotator.rotate_all().await;

        assert_eq!(summary, RotationSummary { rotated: 2, failed: 0 });
        assert_eq!(logs.read("one").await.unwrap(), "");
        assert_eq!(logs.read("two").await.unwrap(), "");

        let all = logs.list(true).await.unwrap();
        assert_eq!(all.len(), 4);
        let rotated_one = all.iter().find(|id| id.starts_with("one-")).unwrap();
        assert_eq!(logs.decompress(rotated_one).await.unwrap(), "a\n");
    }

    #[tokio::test]
    async fn test_rotate_all_without_logs() {
        let dir = tempdir().unwrap();
        let rotator = LogRotator::new(
            Arc::new(FileLogStore::new(dir.path().join("missing"))),
            Duration::from_secs(3600),
        );

        assert_eq!(rotator.rotate_all().await, RotationSummary::default());
    }

    #[tokio::test]
    async fn test_start_runs_immediately_and_stops_on_cancel() {
        let dir = tempdir().unwrap();
        let logs = Arc::new(FileLogStore::new(dir.path()));
        logs.append("abc", "line").await.unwrap();

        let token = CancellationToken::new();
        let handle =
            LogRotator::new(logs.clone(), Duration::from_secs(3600)).start(token.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            while logs.list(true).await.unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first rotation should run right away");

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
