use std::sync::Arc;

use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::checker::{Checker, HttpChecker};
use super::types::{CheckOutcome, ProbeError};
use crate::models::Check;

/// Check executor - runs the probe of a validated check under its deadline
pub struct CheckExecutor {
    checker: Arc<dyn Checker>,
}

impl CheckExecutor {
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    /// Executor backed by a real HTTP client
    pub fn http() -> reqwest::Result<Self> {
        Ok(Self::new(Arc::new(HttpChecker::new()?)))
    }

    /// Probe `check` once.
    ///
    /// Exactly one outcome comes back per call. The deadline covers the whole
    /// probe; when it elapses the in-flight request future is dropped, which
    /// closes its connection.
    pub async fn execute(&self, check: &Check) -> CheckOutcome {
        let target = match Url::parse(&check.target()) {
            Ok(target) => target,
            Err(e) => return CheckOutcome::Error(ProbeError::InvalidTarget(e.to_string())),
        };

        let deadline = check.timeout();
        let outcome = match timeout(deadline, self.checker.probe(&target, check.method, deadline)).await
        {
            Ok(outcome) => outcome,
            Err(_) => CheckOutcome::timeout(),
        };

        debug!(
            check_id = %check.id,
            method = check.method.verb(),
            target = %target,
            outcome = %outcome,
            "Probe finished"
        );

        outcome
    }
}
