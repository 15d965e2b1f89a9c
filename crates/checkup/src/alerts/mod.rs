//! State-change alerts.
//!
//! The dispatcher turns a check transition into a text message and hands it
//! to an [`AlertSender`]. Failures are logged and never retried.

pub mod twilio;

pub use twilio::{TwilioConfig, TwilioSender};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Check;
use crate::store::{Collection, RecordStore};

/// Minimum length of a destination (a phone number)
pub const MIN_DESTINATION_LENGTH: usize = 10;

/// Maximum length of a single message
pub const MAX_MESSAGE_LENGTH: usize = 1600;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("alert provider responded with status code {0}")]
    Rejected(u16),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Delivers a message to a destination
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), AlertError>;
}

/// Trim and bound-check a destination and message before sending
pub fn prepare<'a>(destination: &'a str, message: &'a str) -> Result<(&'a str, &'a str), AlertError> {
    let destination = destination.trim();
    if destination.chars().count() < MIN_DESTINATION_LENGTH {
        return Err(AlertError::InvalidDestination(format!(
            "destination must be at least {MIN_DESTINATION_LENGTH} characters"
        )));
    }

    let message = message.trim();
    if message.is_empty() {
        return Err(AlertError::InvalidMessage("message is required".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AlertError::InvalidMessage(format!(
            "message must be no longer than {MAX_MESSAGE_LENGTH} characters"
        )));
    }

    Ok((destination, message))
}

/// Sender that only writes alerts to the tracing output
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

#[async_trait]
impl AlertSender for LogSender {
    async fn send(&self, destination: &str, message: &str) -> Result<(), AlertError> {
        let (destination, message) = prepare(destination, message)?;
        info!(destination, "Alert: {}", message);
        Ok(())
    }
}

/// Human readable text for a check that changed state
pub fn format_alert(check: &Check) -> String {
    format!(
        "Alert: your check for {} {}://{} has changed to state {}",
        check.method.verb(),
        check.protocol,
        check.url,
        check.state
    )
}

/// Formats and sends state-change alerts
pub struct AlertDispatcher {
    store: Arc<dyn RecordStore>,
    sender: Arc<dyn AlertSender>,
}

impl AlertDispatcher {
    pub fn new(store: Arc<dyn RecordStore>, sender: Arc<dyn AlertSender>) -> Self {
        Self { store, sender }
    }

    /// Contact for the owner of `check`: the `phone` of its user record,
    /// falling back to the owner id itself.
    pub async fn destination(&self, check: &Check) -> String {
        match self.store.read(Collection::Users, &check.owner_id).await {
            Ok(user) => {
                if let Some(phone) = user.get("phone").and_then(|phone| phone.as_str()) {
                    return phone.to_string();
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(check_id = %check.id, "Failed to read owner record: {}", e);
            }
        }
        check.owner_id.clone()
    }

    /// Send the alert for `check`, which already carries its new state.
    /// Returns whether the sender accepted it.
    pub async fn dispatch(&self, check: &Check) -> bool {
        let destination = self.destination(check).await;
        let message = format_alert(check);

        match self.sender.send(&destination, &message).await {
            Ok(()) => {
                info!(check_id = %check.id, state = %check.state, "Alert sent");
                true
            }
            Err(e) => {
                warn!(check_id = %check.id, state = %check.state, "Failed to send alert: {}", e);
                false
            }
        }
    }
}
