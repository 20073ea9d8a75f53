//! Notification Matcher
//!
//! Evaluates every active alert rule against a pass's opportunities and
//! delivers the ones that are not in cooldown. Each (rule, opportunity)
//! match is handled in isolation: a storage or delivery failure is logged
//! and the matcher moves on to the next match.

use super::message::format_alert;
use super::rules::NotificationRule;
use super::telegram::DispatchChannel;
use crate::error::NotifyError;
use crate::persistence::{PersistenceSink, RuleSource};
use crate::strategy::Opportunity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One delivered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct SendRecord {
    pub user_id: i64,
    pub rule_id: i64,
    pub symbol: String,
    /// Rule threshold at the time of sending
    pub threshold: Decimal,
    /// Absolute rate difference that triggered the alert
    pub actual_profit: Decimal,
    pub sent_at: DateTime<Utc>,
}

/// Matches opportunities against user rules and dispatches alerts.
pub struct NotificationMatcher {
    sink: Arc<dyn PersistenceSink>,
    rules: Arc<dyn RuleSource>,
    channel: Arc<dyn DispatchChannel>,
}

impl NotificationMatcher {
    pub fn new(
        sink: Arc<dyn PersistenceSink>,
        rules: Arc<dyn RuleSource>,
        channel: Arc<dyn DispatchChannel>,
    ) -> Self {
        Self {
            sink,
            rules,
            channel,
        }
    }

    /// Load the active rules and dispatch against them.
    ///
    /// A rule source failure skips notifications for this pass.
    pub async fn run(&self, opportunities: &[Opportunity]) -> Vec<SendRecord> {
        if opportunities.is_empty() {
            return Vec::new();
        }

        let rules = match self.rules.get_active_rules() {
            Ok(rules) => rules,
            Err(e) => {
                error!(error = %e, "Failed to load notification rules, skipping notifications");
                return Vec::new();
            }
        };

        self.dispatch(opportunities, &rules).await
    }

    pub async fn dispatch(
        &self,
        opportunities: &[Opportunity],
        rules: &[NotificationRule],
    ) -> Vec<SendRecord> {
        self.dispatch_at(opportunities, rules, Utc::now()).await
    }

    /// Dispatch with an explicit clock, used for cooldown evaluation and
    /// as the send timestamp.
    pub async fn dispatch_at(
        &self,
        opportunities: &[Opportunity],
        rules: &[NotificationRule],
        now: DateTime<Utc>,
    ) -> Vec<SendRecord> {
        let mut sent = Vec::new();

        for rule in rules.iter().filter(|r| r.enabled) {
            for opportunity in opportunities.iter().filter(|o| rule.matches(o)) {
                match self.notify(rule, opportunity, now).await {
                    Ok(Some(record)) => sent.push(record),
                    Ok(None) => debug!(
                        rule_id = rule.id,
                        user_id = rule.user_id,
                        symbol = %opportunity.symbol,
                        "In cooldown, alert suppressed"
                    ),
                    Err(e) => warn!(
                        rule_id = rule.id,
                        user_id = rule.user_id,
                        symbol = %opportunity.symbol,
                        error = %e,
                        "Alert not sent"
                    ),
                }
            }
        }

        if !sent.is_empty() {
            info!(count = sent.len(), "Notifications sent");
        }
        sent
    }

    /// Handle one match: cooldown check, address lookup, delivery, log.
    ///
    /// Returns `Ok(None)` when the match is still in cooldown.
    async fn notify(
        &self,
        rule: &NotificationRule,
        opportunity: &Opportunity,
        now: DateTime<Utc>,
    ) -> Result<Option<SendRecord>, NotifyError> {
        // Fail closed: an unreadable log is treated as a recent send
        let recent = self
            .sink
            .has_recent_notification(rule.user_id, rule.id, &opportunity.symbol, now - rule.cooldown())
            .map_err(NotifyError::CooldownCheck)?;
        if recent {
            return Ok(None);
        }

        let address = self
            .rules
            .get_user_address(rule.user_id)
            .map_err(NotifyError::AddressLookup)?
            .ok_or(NotifyError::NoAddress(rule.user_id))?;

        let message = format_alert(rule, opportunity);
        self.channel.send(&address, &message).await?;

        let record = SendRecord {
            user_id: rule.user_id,
            rule_id: rule.id,
            symbol: opportunity.symbol.clone(),
            threshold: rule.threshold,
            actual_profit: opportunity.abs_rate_difference,
            sent_at: now,
        };

        if let Err(e) = self.sink.log_notification_sent(&record) {
            error!(
                rule_id = rule.id,
                symbol = %record.symbol,
                error = %e,
                "Alert delivered but not logged, cooldown will not apply"
            );
        }

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryError, PersistenceError};
    use crate::notify::rules::{RuleDraft, RuleScope};
    use crate::notify::telegram::MockDispatchChannel;
    use crate::persistence::{MockPersistenceSink, SqliteStore};
    use crate::strategy::{ComparisonEntry, VenueQuote};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap()
    }

    fn opportunity(symbol: &str, a: Decimal, b: Decimal) -> Opportunity {
        let quote = |rate| VenueQuote {
            funding_rate: rate,
            mark_price: None,
            extra: None,
        };
        let entry = ComparisonEntry::new(symbol.to_string(), Some(quote(a)), Some(quote(b)));
        Opportunity::from_entry(&entry, at(0)).unwrap()
    }

    fn store_with_users(users: &[(i64, &str)]) -> Arc<SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        for (user_id, chat) in users {
            store.link_user_address(*user_id, chat).unwrap();
        }
        Arc::new(store)
    }

    fn matcher(store: &Arc<SqliteStore>, channel: MockDispatchChannel) -> NotificationMatcher {
        NotificationMatcher::new(store.clone(), store.clone(), Arc::new(channel))
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_then_reopens() {
        let store = store_with_users(&[(1, "chat-1")]);
        let rule = store
            .create_rule(1, RuleDraft::new(RuleScope::pair("ETH").unwrap(), dec!(0.002), 5).unwrap())
            .unwrap();

        let mut channel = MockDispatchChannel::new();
        channel
            .expect_send()
            .withf(|address, message| address == "chat-1" && message.contains("Pair: ETH"))
            .times(2)
            .returning(|_, _| Ok(()));
        let matcher = matcher(&store, channel);

        let opps = vec![opportunity("ETH", dec!(0.002), dec!(-0.001))];
        let rules = vec![rule];

        assert_eq!(matcher.dispatch_at(&opps, &rules, at(0)).await.len(), 1);
        assert!(matcher.dispatch_at(&opps, &rules, at(3)).await.is_empty());

        let third = matcher.dispatch_at(&opps, &rules, at(6)).await;
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].sent_at, at(6));
        assert_eq!(third[0].actual_profit, dec!(0.003));
        assert_eq!(third[0].threshold, dec!(0.002));
    }

    #[tokio::test]
    async fn test_global_and_pair_rules() {
        let store = store_with_users(&[(1, "chat-1"), (2, "chat-2")]);
        store
            .create_rule(1, RuleDraft::new(RuleScope::Global, dec!(0.001), 5).unwrap())
            .unwrap();
        store
            .create_rule(2, RuleDraft::new(RuleScope::pair("BTC").unwrap(), dec!(0.001), 5).unwrap())
            .unwrap();

        let mut channel = MockDispatchChannel::new();
        channel.expect_send().times(3).returning(|_, _| Ok(()));
        let matcher = matcher(&store, channel);

        let opps = vec![
            opportunity("ETH", dec!(0.003), Decimal::ZERO),
            opportunity("BTC", dec!(0.002), Decimal::ZERO),
            // Below both thresholds
            opportunity("SOL", dec!(0.0005), Decimal::ZERO),
        ];

        let mut sent: Vec<_> = matcher
            .run(&opps)
            .await
            .into_iter()
            .map(|r| (r.user_id, r.symbol))
            .collect();
        sent.sort();

        assert_eq!(
            sent,
            vec![
                (1, "BTC".to_string()),
                (1, "ETH".to_string()),
                (2, "BTC".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_cooldown_check_failure_suppresses() {
        let mut sink = MockPersistenceSink::new();
        sink.expect_has_recent_notification()
            .returning(|_, _, _, _| Err(PersistenceError::LockPoisoned));
        sink.expect_log_notification_sent().never();

        let mut channel = MockDispatchChannel::new();
        channel.expect_send().never();

        let store = store_with_users(&[(1, "chat-1")]);
        let matcher = NotificationMatcher::new(Arc::new(sink), store, Arc::new(channel));

        let rule = NotificationRule::from_draft(
            1,
            1,
            RuleDraft::new(RuleScope::Global, dec!(0.001), 5).unwrap(),
        );
        let sent = matcher
            .dispatch_at(&[opportunity("BTC", dec!(0.01), Decimal::ZERO)], &[rule], at(0))
            .await;

        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_block_others() {
        let store = store_with_users(&[(1, "chat-1"), (2, "chat-2")]);
        store
            .create_rule(1, RuleDraft::new(RuleScope::Global, dec!(0.001), 5).unwrap())
            .unwrap();
        store
            .create_rule(2, RuleDraft::new(RuleScope::Global, dec!(0.001), 5).unwrap())
            .unwrap();

        let mut channel = MockDispatchChannel::new();
        channel
            .expect_send()
            .withf(|address, _| address == "chat-1")
            .times(1)
            .returning(|_, _| {
                Err(DeliveryError::Rejected {
                    status: 403,
                    body: "blocked".to_string(),
                })
            });
        channel
            .expect_send()
            .withf(|address, _| address == "chat-2")
            .times(1)
            .returning(|_, _| Ok(()));
        let matcher = matcher(&store, channel);

        let sent = matcher
            .run(&[opportunity("BTC", dec!(0.01), Decimal::ZERO)])
            .await;

        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, 2);
        // The failed delivery leaves no cooldown entry behind
        assert!(!store
            .has_recent_notification(1, 1, "BTC", at(0) - chrono::Duration::days(1))
            .unwrap());
    }

    #[tokio::test]
    async fn test_missing_address_and_disabled_rules_are_skipped() {
        let store = store_with_users(&[(2, "chat-2")]);
        // User 1 never linked a chat
        let orphan = store
            .create_rule(1, RuleDraft::new(RuleScope::Global, dec!(0.001), 5).unwrap())
            .unwrap();
        let mut disabled = store
            .create_rule(2, RuleDraft::new(RuleScope::Global, dec!(0.001), 5).unwrap())
            .unwrap();
        disabled.enabled = false;

        let mut channel = MockDispatchChannel::new();
        channel.expect_send().never();
        let matcher = matcher(&store, channel);

        let sent = matcher
            .dispatch_at(
                &[opportunity("BTC", dec!(0.01), Decimal::ZERO)],
                &[orphan, disabled],
                at(0),
            )
            .await;

        assert!(sent.is_empty());
    }
}
