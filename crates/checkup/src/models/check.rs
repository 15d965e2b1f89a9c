use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol used to reach a check target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Http, Protocol::Https];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|protocol| protocol.as_str() == s).ok_or(())
    }
}

/// HTTP verb issued by a check, stored lower-case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Get, Method::Put, Method::Post, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
        }
    }

    /// Upper-cased request verb
    pub fn verb(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        Self::ALL.into_iter().find(|method| method.as_str() == s).ok_or(())
    }
}

/// Last known state of a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

/// A validated check record
///
/// Only [`crate::monitoring::validate_check`] builds one from a stored record,
/// and only the outcome processor changes `state` and `last_checked_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    /// Generated id, see [`crate::ids`]
    pub id: String,

    /// Account owning the check, also its alert contact
    pub owner_id: String,

    pub protocol: Protocol,

    /// Host and path, without scheme
    pub url: String,

    pub method: Method,

    /// Response codes that count as `up`
    pub success_codes: Vec<u16>,

    /// Probe deadline, 1 to 5 seconds, not necessarily whole
    pub timeout_seconds: f64,

    #[serde(default)]
    pub state: CheckState,

    /// Time of the last evaluation, stored as epoch milliseconds
    #[serde(
        rename = "lastChecked",
        alias = "lastCheckedAt",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Fields this worker does not interpret, written back untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Check {
    /// `protocol://url`
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }

    /// Probe deadline; a negative or non-finite value yields a zero deadline
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn accepts(&self, status_code: u16) -> bool {
        self.success_codes.contains(&status_code)
    }
}
