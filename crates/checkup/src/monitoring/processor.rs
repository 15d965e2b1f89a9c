//! Turns a probe outcome into a persisted state, an audit log line and,
//! on a transition, an alert.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::types::CheckOutcome;
use crate::alerts::AlertDispatcher;
use crate::logs::{LogStore, LogStoreError};
use crate::models::{Check, CheckState, LogEntry};
use crate::store::{Collection, Record, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to persist check: {0}")]
    Persist(#[from] StoreError),

    #[error("failed to encode log entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to append log entry: {0}")]
    Log(#[from] LogStoreError),
}

/// Result of processing one outcome
#[derive(Debug)]
pub struct Evaluation {
    /// Check as persisted
    pub check: Check,
    pub previous_state: CheckState,
    pub alert_triggered: bool,
}

/// State the check moves to for `outcome`
pub fn next_state(check: &Check, outcome: &CheckOutcome) -> CheckState {
    outcome.state(&check.success_codes)
}

/// Whether moving `previous` to `new_state` is worth an alert.
/// A never evaluated check has no known state, so it never alerts.
pub fn should_alert(previous: &Check, new_state: CheckState) -> bool {
    previous.last_checked_at.is_some() && previous.state != new_state
}

/// `record` with only `state` and the last-checked time replaced.
/// A record that still uses the `lastCheckedAt` spelling keeps it.
fn patch_record(record: &Record, state: CheckState, checked_at: DateTime<Utc>) -> Record {
    let mut patched = record.clone();
    if let Some(fields) = patched.as_object_mut() {
        let key = if fields.contains_key("lastCheckedAt") && !fields.contains_key("lastChecked") {
            "lastCheckedAt"
        } else {
            "lastChecked"
        };
        fields.insert("state".to_string(), Value::from(state.to_string()));
        fields.insert(key.to_string(), Value::from(checked_at.timestamp_millis()));
    }
    patched
}

/// Evaluation timestamp that never goes backwards for a check
fn evaluation_time(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(previous) if previous > now => previous,
        _ => now,
    }
}

/// Outcome processor - owns every state change of a check
pub struct OutcomeProcessor {
    store: Arc<dyn RecordStore>,
    logs: Arc<dyn LogStore>,
    dispatcher: Arc<AlertDispatcher>,
    /// Alert deliveries still in flight
    alerts: Mutex<JoinSet<bool>>,
}

impl OutcomeProcessor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        logs: Arc<dyn LogStore>,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        Self { store, logs, dispatcher, alerts: Mutex::new(JoinSet::new()) }
    }

    fn alerts(&self) -> std::sync::MutexGuard<'_, JoinSet<bool>> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for every alert delivery started so far. Returns how many were accepted.
    pub async fn drain_alerts(&self) -> usize {
        let mut pending = std::mem::take(&mut *self.alerts());
        let mut delivered = 0;

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => warn!("Alert task aborted: {}", e),
            }
        }

        delivered
    }

    /// Persist the new state, append the audit line, then alert if needed.
    ///
    /// `record` is the stored form of `check`; only its state and last-checked
    /// fields are rewritten. A failed persist stops here: no log line and no
    /// alert. A failed append also suppresses the alert.
    pub async fn process(
        &self,
        record: &Record,
        check: &Check,
        outcome: CheckOutcome,
    ) -> Result<Evaluation, ProcessError> {
        let new_state = next_state(check, &outcome);
        let alert_triggered = should_alert(check, new_state);
        let timestamp = evaluation_time(check.last_checked_at);

        let updated = Check { state: new_state, last_checked_at: Some(timestamp), ..check.clone() };

        let record = patch_record(record, new_state, timestamp);
        self.store.update(Collection::Checks, &updated.id, &record).await.map_err(|e| {
            error!(check_id = %check.id, "Failed to persist check state: {}", e);
            ProcessError::Persist(e)
        })?;

        let entry = LogEntry::new(updated.clone(), outcome, alert_triggered, timestamp);
        self.logs.append(&updated.id, &entry.to_line()?).await.map_err(|e| {
            error!(check_id = %check.id, "Failed to append log entry: {}", e);
            ProcessError::Log(e)
        })?;

        debug!(
            check_id = %updated.id,
            previous = %check.state,
            state = %new_state,
            alert_triggered,
            "Outcome processed"
        );

        if alert_triggered {
            info!(check_id = %updated.id, "Check changed from {} to {}", check.state, new_state);
            let dispatcher = Arc::clone(&self.dispatcher);
            let changed = updated.clone();

            let mut alerts = self.alerts();
            while alerts.try_join_next().is_some() {}
            alerts.spawn(async move { dispatcher.dispatch(&changed).await });
        }

        Ok(Evaluation { check: updated, previous_state: check.state, alert_triggered })
    }
}
