use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::check::Check;
use crate::monitoring::types::CheckOutcome;

/// One line of a check's audit log, written once per evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub check_id: String,

    /// Check as persisted after the evaluation
    pub check: Check,

    pub outcome: CheckOutcome,

    pub alert_triggered: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(
        check: Check,
        outcome: CheckOutcome,
        alert_triggered: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { check_id: check.id.clone(), check, outcome, alert_triggered, timestamp }
    }

    /// Render as a single log line (no trailing newline)
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
