//! User-defined alert rules.

use crate::error::RuleError;
use crate::exchange::normalize_symbol;
use crate::strategy::Opportunity;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Cooldown applied when a rule does not specify one.
pub const DEFAULT_COOLDOWN_MINUTES: u32 = 5;

/// What a rule watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleScope {
    /// Every symbol
    Global,
    /// One symbol only
    Pair { symbol: String },
}

impl RuleScope {
    /// Build a scope from its stored representation.
    ///
    /// `pair` requires a symbol and `global` forbids one.
    pub fn from_parts(kind: &str, symbol: Option<&str>) -> Result<Self, RuleError> {
        let symbol = symbol.map(str::trim).filter(|s| !s.is_empty());
        match (kind, symbol) {
            ("global", None) => Ok(RuleScope::Global),
            ("global", Some(_)) => Err(RuleError::invalid("symbol", "must be empty for global rules")),
            ("pair", Some(raw)) => RuleScope::pair(raw),
            ("pair", None) => Err(RuleError::invalid("symbol", "is required for pair rules")),
            (other, _) => Err(RuleError::invalid("type", format!("unknown rule type {:?}", other))),
        }
    }

    /// Pair scope on a normalized symbol.
    pub fn pair(raw: &str) -> Result<Self, RuleError> {
        normalize_symbol(raw)
            .map(|symbol| RuleScope::Pair { symbol })
            .ok_or_else(|| RuleError::invalid("symbol", format!("{:?} is not a symbol", raw)))
    }

    /// Stored type label.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleScope::Global => "global",
            RuleScope::Pair { .. } => "pair",
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match self {
            RuleScope::Global => None,
            RuleScope::Pair { symbol } => Some(symbol),
        }
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleScope::Global => write!(f, "Global"),
            RuleScope::Pair { .. } => write!(f, "Pair"),
        }
    }
}

/// Validate an alert threshold: must lie in (0, 1].
pub fn validate_threshold(threshold: Decimal) -> Result<Decimal, RuleError> {
    if threshold > Decimal::ZERO && threshold <= Decimal::ONE {
        Ok(threshold)
    } else {
        Err(RuleError::invalid("threshold", "must be between 0 and 1"))
    }
}

/// Rule contents before it has been stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDraft {
    pub scope: RuleScope,
    pub threshold: Decimal,
    pub enabled: bool,
    pub cooldown_minutes: u32,
}

impl RuleDraft {
    /// Create a validated, enabled draft.
    pub fn new(scope: RuleScope, threshold: Decimal, cooldown_minutes: u32) -> Result<Self, RuleError> {
        Ok(Self {
            scope,
            threshold: validate_threshold(threshold)?,
            enabled: true,
            cooldown_minutes,
        })
    }
}

/// Partial update to a stored rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleUpdate {
    pub enabled: Option<bool>,
    pub threshold: Option<Decimal>,
    pub cooldown_minutes: Option<u32>,
}

impl RuleUpdate {
    pub fn validate(&self) -> Result<(), RuleError> {
        if let Some(threshold) = self.threshold {
            validate_threshold(threshold)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.threshold.is_none() && self.cooldown_minutes.is_none()
    }
}

/// A stored alert rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRule {
    pub id: i64,
    pub user_id: i64,
    pub scope: RuleScope,
    pub threshold: Decimal,
    pub enabled: bool,
    pub cooldown_minutes: u32,
}

impl NotificationRule {
    pub fn from_draft(id: i64, user_id: i64, draft: RuleDraft) -> Self {
        Self {
            id,
            user_id,
            scope: draft.scope,
            threshold: draft.threshold,
            enabled: draft.enabled,
            cooldown_minutes: draft.cooldown_minutes,
        }
    }

    /// Whether this rule fires for an opportunity (ignoring cooldown).
    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        if opportunity.abs_rate_difference < self.threshold {
            return false;
        }
        match &self.scope {
            RuleScope::Global => true,
            RuleScope::Pair { symbol } => *symbol == opportunity.symbol,
        }
    }

    /// Minimum time between two alerts for the same symbol.
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes))
    }
}
