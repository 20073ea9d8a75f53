//! User alerts.
//!
//! Rules decide which opportunities a user cares about, the matcher applies
//! them with per-rule cooldowns, and a [`DispatchChannel`] delivers the
//! formatted message.

mod matcher;
mod message;
mod rules;
mod telegram;

pub use matcher::{NotificationMatcher, SendRecord};
pub use message::format_alert;
pub use rules::{
    validate_threshold, NotificationRule, RuleDraft, RuleScope, RuleUpdate,
    DEFAULT_COOLDOWN_MINUTES,
};
pub use telegram::{DispatchChannel, TelegramChannel, TELEGRAM_API_URL};
