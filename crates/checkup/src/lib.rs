//! Checkup - uptime check evaluation worker
//!
//! This library periodically re-evaluates persisted HTTP/HTTPS checks,
//! records every evaluation in a per-check audit log, alerts check owners
//! on state transitions and rotates the audit logs.

pub mod alerts;
pub mod ids;
pub mod logs;
pub mod models;
pub mod monitoring;
pub mod store;

// Re-export main types
pub use alerts::{AlertDispatcher, AlertSender, LogSender, TwilioConfig, TwilioSender};
pub use logs::{FileLogStore, LogRotator, LogStore};
pub use models::{Check, CheckState, LogEntry, Method, Protocol};
pub use monitoring::{
    CheckExecutor, CheckOutcome, CheckPipeline, OutcomeProcessor, ProbeError, Scheduler,
    Validation, validate_check,
};
pub use store::{Collection, FileStore, MemoryStore, RecordStore, SqlStore, StoreError};

/// Default period between two scheduler ticks
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// Default period between two log rotations
pub const DEFAULT_ROTATION_INTERVAL_SECS: u64 = 24 * 60 * 60;
