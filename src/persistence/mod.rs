//! Persistence for rate snapshots, opportunities and alert history.
//!
//! The pipeline talks to storage through two narrow traits:
//! - [`PersistenceSink`]: append rates/opportunities, cooldown log
//! - [`RuleSource`]: active alert rules and delivery addresses
//!
//! [`SqliteStore`] implements both and adds the history, statistics and
//! rule management queries used by the CLI.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::PersistenceError;
use crate::exchange::{Exchange, FundingRateSample};
use crate::notify::{NotificationRule, SendRecord};
use crate::strategy::Opportunity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Opportunity as written to storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOpportunity {
    pub id: i64,
    pub symbol: String,
    pub rate_a: Decimal,
    pub rate_b: Decimal,
    pub abs_rate_difference: Decimal,
    pub risk_level: String,
    pub detected_at: DateTime<Utc>,
}

/// Durable sink for pipeline side effects.
#[cfg_attr(test, mockall::automock)]
pub trait PersistenceSink: Send + Sync {
    /// Append one exchange's samples. Returns the number of rows written.
    fn save_funding_rates(
        &self,
        samples: &[FundingRateSample],
        exchange: Exchange,
    ) -> Result<usize, PersistenceError>;

    fn save_opportunity(&self, opportunity: &Opportunity)
        -> Result<StoredOpportunity, PersistenceError>;

    /// Whether an alert for (user, rule, symbol) was sent after `since`.
    fn has_recent_notification(
        &self,
        user_id: i64,
        rule_id: i64,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    fn log_notification_sent(&self, record: &SendRecord) -> Result<(), PersistenceError>;
}

/// Read-only view of alert rules and where to deliver them.
#[cfg_attr(test, mockall::automock)]
pub trait RuleSource: Send + Sync {
    /// Enabled rules only.
    fn get_active_rules(&self) -> Result<Vec<NotificationRule>, PersistenceError>;

    fn get_user_address(&self, user_id: i64) -> Result<Option<String>, PersistenceError>;
}
