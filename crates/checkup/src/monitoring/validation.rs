//! Validation of stored check records.
//!
//! Records come out of the store as untyped JSON. Every field runs through its
//! own rule chain, which stops at the first failing rule; the errors of all
//! fields are collected so a skipped check is reported in one log line.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::ids;
use crate::models::{Check, CheckState, Method, Protocol};

/// Accepted probe timeout range, in seconds
pub const MIN_TIMEOUT_SECONDS: f64 = 1.0;
pub const MAX_TIMEOUT_SECONDS: f64 = 5.0;

/// Minimum length of an owner id (a phone number)
pub const MIN_OWNER_ID_LENGTH: usize = 10;

const KNOWN_FIELDS: &[&str] = &[
    "id",
    "ownerId",
    "phone",
    "protocol",
    "url",
    "method",
    "successCodes",
    "timeoutSeconds",
    "state",
    "lastChecked",
    "lastCheckedAt",
];

/// A single failed field rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating a record
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Valid(T),
    Invalid(Vec<FieldError>),
}

impl<T> Validation<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn into_result(self) -> Result<T, Vec<FieldError>> {
        match self {
            Validation::Valid(value) => Ok(value),
            Validation::Invalid(errors) => Err(errors),
        }
    }

    pub fn errors(&self) -> &[FieldError] {
        match self {
            Validation::Valid(_) => &[],
            Validation::Invalid(errors) => errors,
        }
    }
}

/// Validate a raw `checks` record
pub fn validate_check(record: &Value) -> Validation<Check> {
    let Some(fields) = record.as_object() else {
        return Validation::Invalid(vec![FieldError::new("record", "must be a JSON object")]);
    };

    let mut errors = Vec::new();

    let id = collect(validate_id(fields.get("id")), &mut errors);
    let owner_id = collect(
        validate_owner_id(fields.get("ownerId").or_else(|| fields.get("phone"))),
        &mut errors,
    );
    let protocol = collect(validate_protocol(fields.get("protocol")), &mut errors);
    let url = collect(validate_url(fields.get("url")), &mut errors);
    let method = collect(validate_method(fields.get("method")), &mut errors);
    let success_codes = collect(validate_success_codes(fields.get("successCodes")), &mut errors);
    let timeout_seconds =
        collect(validate_timeout_seconds(fields.get("timeoutSeconds")), &mut errors);
    let state = collect(validate_state(fields.get("state")), &mut errors);
    let last_checked_at = collect(
        validate_last_checked(fields.get("lastChecked").or_else(|| fields.get("lastCheckedAt"))),
        &mut errors,
    );

    let (
        Some(id),
        Some(owner_id),
        Some(protocol),
        Some(url),
        Some(method),
        Some(success_codes),
        Some(timeout_seconds),
        Some(state),
        Some(last_checked_at),
    ) = (id, owner_id, protocol, url, method, success_codes, timeout_seconds, state, last_checked_at)
    else {
        return Validation::Invalid(errors);
    };

    let extra: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Validation::Valid(Check {
        id,
        owner_id,
        protocol,
        url,
        method,
        success_codes,
        timeout_seconds,
        state,
        last_checked_at,
        extra,
    })
}

fn collect<T>(result: Result<T, FieldError>, errors: &mut Vec<FieldError>) -> Option<T> {
    result.map_err(|error| errors.push(error)).ok()
}

fn required<'a>(value: Option<&'a Value>, field: &'static str) -> Result<&'a Value, FieldError> {
    match value {
        None | Some(Value::Null) => Err(FieldError::new(field, format!("{field} is required"))),
        Some(value) => Ok(value),
    }
}

fn string<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, FieldError> {
    value.as_str().ok_or_else(|| FieldError::new(field, "must be a string"))
}

fn validate_id(value: Option<&Value>) -> Result<String, FieldError> {
    let id = string(required(value, "id")?, "id")?;
    if !ids::is_valid(id) {
        return Err(FieldError::new(
            "id",
            format!("id must be {} lowercase alphanumeric characters", ids::ID_LENGTH),
        ));
    }
    Ok(id.to_string())
}

fn validate_owner_id(value: Option<&Value>) -> Result<String, FieldError> {
    let owner_id = string(required(value, "ownerId")?, "ownerId")?.trim();
    if owner_id.chars().count() < MIN_OWNER_ID_LENGTH {
        return Err(FieldError::new(
            "ownerId",
            format!("ownerId must be at least {MIN_OWNER_ID_LENGTH} characters"),
        ));
    }
    Ok(owner_id.to_string())
}

fn validate_protocol(value: Option<&Value>) -> Result<Protocol, FieldError> {
    string(required(value, "protocol")?, "protocol")?.parse().map_err(|_| {
        FieldError::new("protocol", "protocol must be one of http, https")
    })
}

fn validate_url(value: Option<&Value>) -> Result<String, FieldError> {
    let url = string(required(value, "url")?, "url")?.trim();
    if url.is_empty() {
        return Err(FieldError::new("url", "url must not be empty"));
    }
    Ok(url.to_string())
}

fn validate_method(value: Option<&Value>) -> Result<Method, FieldError> {
    string(required(value, "method")?, "method")?.parse().map_err(|_| {
        FieldError::new("method", "method must be one of get, put, post, delete")
    })
}

fn validate_success_codes(value: Option<&Value>) -> Result<Vec<u16>, FieldError> {
    let codes = required(value, "successCodes")?
        .as_array()
        .ok_or_else(|| FieldError::new("successCodes", "must be an array"))?;

    if codes.is_empty() {
        return Err(FieldError::new("successCodes", "successCodes must have at least 1 code"));
    }

    let mut parsed: Vec<u16> = Vec::with_capacity(codes.len());
    for code in codes {
        if !code.is_number() {
            return Err(FieldError::new("successCodes", format!("{code} is not a number")));
        }
        // Numbers no response can carry are accepted but never match
        if let Some(code) = code.as_u64().and_then(|code| u16::try_from(code).ok()) {
            if !parsed.contains(&code) {
                parsed.push(code);
            }
        }
    }

    Ok(parsed)
}

fn validate_timeout_seconds(value: Option<&Value>) -> Result<f64, FieldError> {
    let seconds = required(value, "timeoutSeconds")?
        .as_f64()
        .filter(|seconds| seconds.is_finite())
        .ok_or_else(|| FieldError::new("timeoutSeconds", "must be a number"))?;

    if seconds < MIN_TIMEOUT_SECONDS {
        return Err(FieldError::new(
            "timeoutSeconds",
            format!("timeoutSeconds must be at least {MIN_TIMEOUT_SECONDS} second"),
        ));
    }

    if seconds > MAX_TIMEOUT_SECONDS {
        return Err(FieldError::new(
            "timeoutSeconds",
            format!("timeoutSeconds must be a maximum of {MAX_TIMEOUT_SECONDS} seconds"),
        ));
    }

    Ok(seconds)
}

fn validate_state(value: Option<&Value>) -> Result<CheckState, FieldError> {
    match value {
        None | Some(Value::Null) => Ok(CheckState::default()),
        Some(Value::String(state)) if state == "up" => Ok(CheckState::Up),
        Some(Value::String(state)) if state == "down" => Ok(CheckState::Down),
        Some(_) => Err(FieldError::new("state", "state must be one of up, down")),
    }
}

fn validate_last_checked(value: Option<&Value>) -> Result<Option<DateTime<Utc>>, FieldError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(Some)
            .ok_or_else(|| {
                FieldError::new("lastChecked", "lastChecked must be an epoch timestamp in milliseconds")
            }),
    }
}
