pub mod check;
pub mod log_entry;

pub use check::{Check, CheckState, Method, Protocol};
pub use log_entry::LogEntry;
