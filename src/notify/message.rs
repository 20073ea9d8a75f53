//! Alert message formatting.

use super::rules::NotificationRule;
use crate::exchange::Exchange;
use crate::strategy::Opportunity;
use crate::utils::decimal::{format_percent, format_signed_percent};

/// Render the alert text sent to a user.
pub fn format_alert(rule: &NotificationRule, opportunity: &Opportunity) -> String {
    format!(
        "🚨 Arbitrage Alert!\n\
         \n\
         💱 Pair: {symbol}\n\
         📈 {a}: {rate_a}%\n\
         📉 {b}: {rate_b}%\n\
         💰 Potential: ~{profit}%\n\
         📊 Strategy: {strategy}\n\
         \n\
         ⚡ {scope} Alert (≥{threshold}%)",
        symbol = opportunity.symbol,
        a = Exchange::A,
        rate_a = format_signed_percent(opportunity.rate_a, 4),
        b = Exchange::B,
        rate_b = format_signed_percent(opportunity.rate_b, 4),
        profit = format_percent(opportunity.abs_rate_difference, 4),
        strategy = opportunity.direction.label(),
        scope = rule.scope,
        threshold = format_percent(rule.threshold, 2),
    )
}
