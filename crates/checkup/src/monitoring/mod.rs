pub mod checker;
/// Monitoring engine - evaluates stored checks
///
/// This module is responsible for:
/// - Validating stored check records
/// - Probing HTTP/HTTPS targets under a deadline
/// - Persisting state transitions and writing audit log entries
/// - Scheduling evaluation of every check on a fixed period
pub mod executor;
pub mod processor;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use executor::CheckExecutor;
pub use processor::{Evaluation, OutcomeProcessor, ProcessError};
pub use scheduler::{CheckPipeline, CheckReport, Scheduler, TickSummary};
pub use types::{CheckOutcome, ProbeError};
pub use validation::{FieldError, Validation, validate_check};
