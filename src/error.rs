//! Error types for storage, delivery, alert rules and dashboard queries.
//!
//! Upstream exchange failures stay `anyhow::Error` inside the clients and are
//! converted to empty results at the gateway boundary; nothing here is fatal
//! to the process.

use thiserror::Error;

/// Errors raised by the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database connection lock poisoned")]
    LockPoisoned,

    #[error("corrupt {field} in stored row: {value:?}")]
    Corrupt { field: &'static str, value: String },
}

/// Errors raised while delivering a message to one recipient.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("message rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Errors raised by notification rule validation and management.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid notification rule: {field} {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("notification rule {0} not found")]
    NotFound(i64),
}

impl RuleError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Dashboard window outside the supported set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid timeframe {0:?}, expected one of 1h, 4h, 24h, 7d")]
pub struct InvalidTimeframe(pub String);

/// Why a single (rule, opportunity) match did not produce a notification.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("cooldown check failed, suppressing: {0}")]
    CooldownCheck(#[source] PersistenceError),

    #[error("no delivery address for user {0}")]
    NoAddress(i64),

    #[error("address lookup failed: {0}")]
    AddressLookup(#[source] PersistenceError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
