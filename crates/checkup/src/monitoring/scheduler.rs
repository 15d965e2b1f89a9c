use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::executor::CheckExecutor;
use super::processor::OutcomeProcessor;
use super::validation::{FieldError, Validation, validate_check};
use crate::models::CheckState;
use crate::store::{Collection, RecordStore, StoreError};

/// What happened to one check during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckReport {
    /// Failed validation; nothing was executed or written
    Skipped { check_id: String, errors: Vec<FieldError> },
    /// Probed, persisted and logged
    Evaluated { check_id: String, state: CheckState, alert_triggered: bool },
    /// Probed but the result could not be recorded
    Failed { check_id: String, reason: String },
    /// Stopped by shutdown before its probe finished; nothing was written
    Cancelled { check_id: String },
}

/// Tally of a finished tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub up: usize,
    pub down: usize,
    pub alerts: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl TickSummary {
    fn record(&mut self, report: &CheckReport) {
        match report {
            CheckReport::Skipped { .. } => self.skipped += 1,
            CheckReport::Evaluated { state, alert_triggered, .. } => {
                match state {
                    CheckState::Up => self.up += 1,
                    CheckState::Down => self.down += 1,
                }
                if *alert_triggered {
                    self.alerts += 1;
                }
            }
            CheckReport::Failed { .. } => self.failed += 1,
            CheckReport::Cancelled { .. } => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.up + self.down + self.skipped + self.failed + self.cancelled
    }
}

/// Validate, execute and process a single check record
pub struct CheckPipeline {
    executor: CheckExecutor,
    processor: OutcomeProcessor,
}

impl CheckPipeline {
    pub fn new(executor: CheckExecutor, processor: OutcomeProcessor) -> Self {
        Self { executor, processor }
    }

    /// Run `record` through validation, the probe and outcome processing.
    ///
    /// Cancellation only interrupts the probe. Once an outcome exists it is
    /// always persisted and logged.
    pub async fn evaluate(&self, record: Value, token: &CancellationToken) -> CheckReport {
        let check_id = record_id(&record);

        let check = match validate_check(&record) {
            Validation::Valid(check) => check,
            Validation::Invalid(errors) => {
                let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
                warn!(check_id = %check_id, "Skipping invalid check: {}", listed.join(", "));
                return CheckReport::Skipped { check_id, errors };
            }
        };

        let outcome = tokio::select! {
            outcome = self.executor.execute(&check) => outcome,
            _ = token.cancelled() => {
                debug!(check_id = %check_id, "Probe cancelled");
                return CheckReport::Cancelled { check_id };
            }
        };

        match self.processor.process(&record, &check, outcome).await {
            Ok(evaluation) => CheckReport::Evaluated {
                check_id,
                state: evaluation.check.state,
                alert_triggered: evaluation.alert_triggered,
            },
            Err(e) => CheckReport::Failed { check_id, reason: e.to_string() },
        }
    }

    /// Wait for alerts still being delivered
    pub async fn drain_alerts(&self) -> usize {
        self.processor.drain_alerts().await
    }
}

fn record_id(record: &Value) -> String {
    record.get("id").and_then(Value::as_str).unwrap_or("<unknown>").to_string()
}

/// Check scheduler - evaluates every stored check once per period
pub struct Scheduler {
    store: Arc<dyn RecordStore>,
    pipeline: Arc<CheckPipeline>,
    period: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<dyn RecordStore>, pipeline: Arc<CheckPipeline>, period: Duration) -> Self {
        Self { store, pipeline, period }
    }

    /// Start one tick.
    ///
    /// Every check runs in its own task; this returns as soon as they are
    /// spawned. The returned handle resolves once all of them finished and is
    /// only needed by callers that want the summary.
    pub async fn tick(&self, token: &CancellationToken) -> Result<JoinHandle<TickSummary>, StoreError> {
        let records = self.store.list(Collection::Checks).await?;

        if records.is_empty() {
            debug!("No checks to evaluate");
        }

        let mut tasks = JoinSet::new();
        for record in records {
            let pipeline = Arc::clone(&self.pipeline);
            let cancelled = token.child_token();
            tasks.spawn(async move { pipeline.evaluate(record, &cancelled).await });
        }

        Ok(tokio::spawn(collect_reports(tasks)))
    }

    /// Start the background scheduling loop. The first tick runs immediately;
    /// a slow tick never delays the next one. After cancellation the returned
    /// handle resolves once every started tick has finished.
    pub fn start(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(self.period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight: Vec<JoinHandle<TickSummary>> = Vec::new();

            info!("Check scheduler started (period: {:?})", self.period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {
                        in_flight.retain(|tick| !tick.is_finished());
                        match self.tick(&token).await {
                            Ok(tick) => in_flight.push(tick),
                            Err(e) => error!("Failed to list checks: {}", e),
                        }
                    }
                }
            }

            for tick in in_flight {
                if let Err(e) = tick.await {
                    error!("Tick aborted: {}", e);
                }
            }
            info!("Check scheduler stopped");
        })
    }
}

async fn collect_reports(mut tasks: JoinSet<CheckReport>) -> TickSummary {
    let mut summary = TickSummary::default();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => summary.record(&report),
            Err(e) => {
                error!("Check task aborted: {}", e);
                summary.failed += 1;
            }
        }
    }

    if summary.total() > 0 {
        info!(
            up = summary.up,
            down = summary.down,
            alerts = summary.alerts,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Tick finished"
        );
    }

    summary
}
