//! SQLite-backed store.

use super::{PersistenceSink, RuleSource, StoredOpportunity};
use crate::error::PersistenceError;
use crate::exchange::{Exchange, FundingRateSample};
use crate::notify::{NotificationRule, RuleDraft, RuleScope, RuleUpdate, SendRecord};
use crate::strategy::{
    market_overview, HistoryPoint, MarketSummary, Opportunity, OverviewBucket, Timeframe,
    SUMMARY_WINDOW_HOURS,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// SQLite persistence for rates, opportunities, rules and alert history.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PersistenceError::Corrupt {
            field: "timestamp",
            value: value.to_string(),
        })
}

fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal, PersistenceError> {
    Decimal::from_str(value).map_err(|_| PersistenceError::Corrupt {
        field,
        value: value.to_string(),
    })
}

/// Raw opportunity row: id, symbol, rate_a, rate_b, abs diff, risk level, detected_at.
type OpportunityRow = (i64, String, String, String, String, String, String);

fn read_opportunity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OpportunityRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn opportunity_from_row(row: OpportunityRow) -> Result<StoredOpportunity, PersistenceError> {
    let (id, symbol, rate_a, rate_b, abs_diff, risk_level, detected_at) = row;
    Ok(StoredOpportunity {
        id,
        symbol,
        rate_a: parse_decimal("rate_a", &rate_a)?,
        rate_b: parse_decimal("rate_b", &rate_b)?,
        abs_rate_difference: parse_decimal("abs_rate_difference", &abs_diff)?,
        risk_level,
        detected_at: parse_ts(&detected_at)?,
    })
}

/// Raw rule row: id, user_id, type, symbol, threshold, enabled, cooldown_minutes.
type RuleRow = (i64, i64, String, Option<String>, String, bool, u32);

const RULE_COLUMNS: &str =
    "id, user_id, rule_type, symbol, threshold, enabled, cooldown_minutes";

fn read_rule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn rule_from_row(row: RuleRow) -> Option<NotificationRule> {
    let (id, user_id, kind, symbol, threshold, enabled, cooldown_minutes) = row;

    let scope = match RuleScope::from_parts(&kind, symbol.as_deref()) {
        Ok(scope) => scope,
        Err(e) => {
            warn!(rule_id = id, error = %e, "Skipping malformed notification rule");
            return None;
        }
    };
    let threshold = match parse_decimal("threshold", &threshold) {
        Ok(t) => t,
        Err(e) => {
            warn!(rule_id = id, error = %e, "Skipping malformed notification rule");
            return None;
        }
    };

    Some(NotificationRule {
        id,
        user_id,
        scope,
        threshold,
        enabled,
        cooldown_minutes,
    })
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and initialize the schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path.as_ref())?;
        let store = Self::from_connection(conn)?;

        info!("Store initialized at {:?}", db_path.as_ref());
        Ok(store)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            -- Raw funding rate snapshots, one row per exchange and symbol per pass
            CREATE TABLE IF NOT EXISTS funding_rates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exchange TEXT NOT NULL,
                symbol TEXT NOT NULL,
                funding_rate TEXT NOT NULL,
                mark_price TEXT,
                observed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_rates_symbol_time ON funding_rates(symbol, observed_at);

            -- Detected opportunities
            CREATE TABLE IF NOT EXISTS arbitrage_opportunities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                rate_a TEXT NOT NULL,
                rate_b TEXT NOT NULL,
                abs_rate_difference TEXT NOT NULL,
                direction TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                detected_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_opps_time ON arbitrage_opportunities(detected_at);

            -- Delivery addresses (Telegram chat ids)
            CREATE TABLE IF NOT EXISTS user_addresses (
                user_id INTEGER PRIMARY KEY,
                address TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Alert rules
            CREATE TABLE IF NOT EXISTS notification_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                rule_type TEXT NOT NULL CHECK (rule_type IN ('global', 'pair')),
                symbol TEXT,
                threshold TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                cooldown_minutes INTEGER NOT NULL DEFAULT 5,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_rules_user ON notification_rules(user_id);

            -- Sent alerts, append-only; drives cooldowns
            CREATE TABLE IF NOT EXISTS notification_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                rule_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                threshold_at_send TEXT NOT NULL,
                actual_profit TEXT NOT NULL,
                sent_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_log_cooldown
                ON notification_log(user_id, rule_id, symbol, sent_at);
            "#,
        )?;

        // Rule tables created before per-rule cooldowns lack the column
        let has_cooldown = conn
            .prepare(
                "SELECT 1 FROM pragma_table_info('notification_rules') WHERE name = 'cooldown_minutes'",
            )?
            .exists([])?;
        if !has_cooldown {
            conn.execute(
                "ALTER TABLE notification_rules ADD COLUMN cooldown_minutes INTEGER NOT NULL DEFAULT 5",
                [],
            )?;
            info!("Added cooldown_minutes to notification_rules");
        }

        debug!("Database schema initialized");
        Ok(())
    }

    // ==================== Delivery addresses ====================

    /// Link a user to the chat id alerts should be delivered to.
    pub fn link_user_address(&self, user_id: i64, address: &str) -> Result<(), PersistenceError> {
        self.conn()?.execute(
            r#"
            INSERT INTO user_addresses (user_id, address, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET address = ?2, updated_at = ?3
            "#,
            params![user_id, address, ts(&Utc::now())],
        )?;
        Ok(())
    }

    // ==================== Rule management ====================

    pub fn create_rule(
        &self,
        user_id: i64,
        draft: RuleDraft,
    ) -> Result<NotificationRule, PersistenceError> {
        let conn = self.conn()?;
        let now = ts(&Utc::now());
        conn.execute(
            r#"
            INSERT INTO notification_rules
                (user_id, rule_type, symbol, threshold, enabled, cooldown_minutes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                user_id,
                draft.scope.kind(),
                draft.scope.symbol(),
                draft.threshold.to_string(),
                draft.enabled,
                draft.cooldown_minutes,
                now,
            ],
        )?;

        let rule = NotificationRule::from_draft(conn.last_insert_rowid(), user_id, draft);
        info!(rule_id = rule.id, user_id, scope = %rule.scope, "Notification rule created");
        Ok(rule)
    }

    /// All rules owned by a user, enabled or not.
    pub fn get_user_rules(&self, user_id: i64) -> Result<Vec<NotificationRule>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notification_rules WHERE user_id = ?1 ORDER BY id",
            RULE_COLUMNS
        ))?;

        let rows = stmt
            .query_map([user_id], read_rule_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows.into_iter().filter_map(rule_from_row).collect())
    }

    fn get_rule(
        conn: &Connection,
        rule_id: i64,
        user_id: i64,
    ) -> Result<Option<NotificationRule>, PersistenceError> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM notification_rules WHERE id = ?1 AND user_id = ?2",
                    RULE_COLUMNS
                ),
                params![rule_id, user_id],
                read_rule_row,
            )
            .optional()?;

        Ok(row.and_then(rule_from_row))
    }

    /// Apply a partial update. Returns `None` if the user owns no such rule.
    pub fn update_rule(
        &self,
        rule_id: i64,
        user_id: i64,
        update: &RuleUpdate,
    ) -> Result<Option<NotificationRule>, PersistenceError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE notification_rules SET
                enabled = COALESCE(?3, enabled),
                threshold = COALESCE(?4, threshold),
                cooldown_minutes = COALESCE(?5, cooldown_minutes),
                updated_at = ?6
            WHERE id = ?1 AND user_id = ?2
            "#,
            params![
                rule_id,
                user_id,
                update.enabled,
                update.threshold.map(|t| t.to_string()),
                update.cooldown_minutes,
                ts(&Utc::now()),
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        info!(rule_id, "Notification rule updated");
        Self::get_rule(&conn, rule_id, user_id)
    }

    /// Delete a rule. Returns `false` if the user owns no such rule.
    pub fn delete_rule(&self, rule_id: i64, user_id: i64) -> Result<bool, PersistenceError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM notification_rules WHERE id = ?1 AND user_id = ?2",
            params![rule_id, user_id],
        )?;

        if deleted > 0 {
            info!(rule_id, "Notification rule deleted");
        }
        Ok(deleted > 0)
    }

    // ==================== History queries ====================

    /// Funding rates for a symbol between `start` and `end`, bucketed per minute.
    ///
    /// Within a bucket the latest observation per exchange wins.
    pub fn get_funding_rate_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT exchange, funding_rate, observed_at
            FROM funding_rates
            WHERE symbol = ?1 AND observed_at >= ?2 AND observed_at <= ?3
            ORDER BY observed_at
            "#,
        )?;

        let rows = stmt
            .query_map(params![symbol, ts(&start), ts(&end)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut buckets: BTreeMap<i64, HistoryPoint> = BTreeMap::new();
        for (exchange, rate, observed_at) in rows {
            let observed_at = parse_ts(&observed_at)?;
            let rate = parse_decimal("funding_rate", &rate)?;
            let minute = observed_at.timestamp() - observed_at.timestamp().rem_euclid(60);

            let point = buckets.entry(minute).or_insert_with(|| HistoryPoint {
                at: DateTime::from_timestamp(minute, 0).unwrap_or(observed_at),
                rate_a: None,
                rate_b: None,
            });

            if exchange == Exchange::A.as_str() {
                point.rate_a = Some(rate);
            } else if exchange == Exchange::B.as_str() {
                point.rate_b = Some(rate);
            }
        }

        Ok(buckets.into_values().collect())
    }

    /// Most recently detected opportunities, newest first.
    pub fn get_latest_opportunities(
        &self,
        limit: usize,
    ) -> Result<Vec<StoredOpportunity>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, symbol, rate_a, rate_b, abs_rate_difference, risk_level, detected_at
            FROM arbitrage_opportunities
            ORDER BY detected_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], read_opportunity_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(opportunity_from_row).collect()
    }

    /// Opportunities detected in `[since, until)`, oldest first.
    pub fn get_opportunities_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<StoredOpportunity>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, symbol, rate_a, rate_b, abs_rate_difference, risk_level, detected_at
            FROM arbitrage_opportunities
            WHERE detected_at >= ?1 AND detected_at < ?2
            ORDER BY detected_at ASC, id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![ts(&since), ts(&until)], read_opportunity_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(opportunity_from_row).collect()
    }

    // ==================== Dashboard ====================

    /// Market summary over the last day.
    pub fn market_summary(&self) -> Result<MarketSummary, PersistenceError> {
        self.market_summary_at(Utc::now())
    }

    pub fn market_summary_at(&self, now: DateTime<Utc>) -> Result<MarketSummary, PersistenceError> {
        let since = now - Duration::hours(SUMMARY_WINDOW_HOURS);
        let opportunities = self.get_opportunities_between(since, now)?;
        Ok(MarketSummary::from_opportunities(&opportunities))
    }

    /// Bucketed opportunity activity over `timeframe`.
    pub fn market_overview(
        &self,
        timeframe: Timeframe,
    ) -> Result<Vec<OverviewBucket>, PersistenceError> {
        self.market_overview_at(timeframe, Utc::now())
    }

    pub fn market_overview_at(
        &self,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<Vec<OverviewBucket>, PersistenceError> {
        let opportunities = self.get_opportunities_between(now - timeframe.lookback(), now)?;
        debug!(
            timeframe = %timeframe,
            rows = opportunities.len(),
            "Building market overview"
        );
        Ok(market_overview(timeframe, &opportunities, now))
    }
}

impl PersistenceSink for SqliteStore {
    fn save_funding_rates(
        &self,
        samples: &[FundingRateSample],
        exchange: Exchange,
    ) -> Result<usize, PersistenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO funding_rates (exchange, symbol, funding_rate, mark_price, observed_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for sample in samples {
                stmt.execute(params![
                    exchange.as_str(),
                    sample.symbol,
                    sample.funding_rate.to_string(),
                    sample.mark_price.map(|p| p.to_string()),
                    ts(&sample.observed_at),
                ])?;
            }
        }
        tx.commit()?;

        debug!(exchange = %exchange, rows = samples.len(), "Funding rates saved");
        Ok(samples.len())
    }

    fn save_opportunity(
        &self,
        opportunity: &Opportunity,
    ) -> Result<StoredOpportunity, PersistenceError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO arbitrage_opportunities
                (symbol, rate_a, rate_b, abs_rate_difference, direction, risk_level, detected_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                opportunity.symbol,
                opportunity.rate_a.to_string(),
                opportunity.rate_b.to_string(),
                opportunity.abs_rate_difference.to_string(),
                opportunity.direction.as_str(),
                opportunity.risk_level.as_str(),
                ts(&opportunity.detected_at),
            ],
        )?;

        Ok(StoredOpportunity {
            id: conn.last_insert_rowid(),
            symbol: opportunity.symbol.clone(),
            rate_a: opportunity.rate_a,
            rate_b: opportunity.rate_b,
            abs_rate_difference: opportunity.abs_rate_difference,
            risk_level: opportunity.risk_level.as_str().to_string(),
            detected_at: opportunity.detected_at,
        })
    }

    fn has_recent_notification(
        &self,
        user_id: i64,
        rule_id: i64,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let exists: bool = self.conn()?.query_row(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM notification_log
                WHERE user_id = ?1 AND rule_id = ?2 AND symbol = ?3 AND sent_at > ?4
            )
            "#,
            params![user_id, rule_id, symbol, ts(&since)],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn log_notification_sent(&self, record: &SendRecord) -> Result<(), PersistenceError> {
        self.conn()?.execute(
            r#"
            INSERT INTO notification_log
                (user_id, rule_id, symbol, threshold_at_send, actual_profit, sent_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.user_id,
                record.rule_id,
                record.symbol,
                record.threshold.to_string(),
                record.actual_profit.to_string(),
                ts(&record.sent_at),
            ],
        )?;
        Ok(())
    }
}

impl RuleSource for SqliteStore {
    fn get_active_rules(&self) -> Result<Vec<NotificationRule>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notification_rules WHERE enabled = 1 ORDER BY id",
            RULE_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], read_rule_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows.into_iter().filter_map(rule_from_row).collect())
    }

    fn get_user_address(&self, user_id: i64) -> Result<Option<String>, PersistenceError> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT address FROM user_addresses WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ComparisonEntry, VenueQuote};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, minute, second).unwrap()
    }

    fn opportunity(symbol: &str, a: Decimal, b: Decimal, when: DateTime<Utc>) -> Opportunity {
        let quote = |rate| VenueQuote {
            funding_rate: rate,
            mark_price: None,
            extra: None,
        };
        let entry = ComparisonEntry::new(symbol.to_string(), Some(quote(a)), Some(quote(b)));
        Opportunity::from_entry(&entry, when).unwrap()
    }

    #[test]
    fn test_rule_crud() {
        let store = SqliteStore::open_in_memory().unwrap();

        let global = store
            .create_rule(1, RuleDraft::new(RuleScope::Global, dec!(0.001), 5).unwrap())
            .unwrap();
        let pair = store
            .create_rule(1, RuleDraft::new(RuleScope::pair("ETH").unwrap(), dec!(0.002), 10).unwrap())
            .unwrap();
        store
            .create_rule(2, RuleDraft::new(RuleScope::Global, dec!(0.5), 5).unwrap())
            .unwrap();

        let rules = store.get_user_rules(1).unwrap();
        assert_eq!(rules, vec![global.clone(), pair.clone()]);
        assert_eq!(rules[1].scope.symbol(), Some("ETH"));

        let updated = store
            .update_rule(
                pair.id,
                1,
                &RuleUpdate {
                    enabled: Some(false),
                    threshold: Some(dec!(0.004)),
                    cooldown_minutes: None,
                },
            )
            .unwrap()
            .unwrap();
        assert!(!updated.enabled);
        assert_eq!(updated.threshold, dec!(0.004));
        assert_eq!(updated.cooldown_minutes, 10);

        // Wrong owner
        assert!(store.update_rule(pair.id, 2, &RuleUpdate::default()).unwrap().is_none());
        assert!(!store.delete_rule(global.id, 2).unwrap());

        let active = store.get_active_rules().unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|r| r.enabled));

        assert!(store.delete_rule(global.id, 1).unwrap());
        assert_eq!(store.get_user_rules(1).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_rule_rows_are_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_rule(1, RuleDraft::new(RuleScope::Global, dec!(0.001), 5).unwrap())
            .unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO notification_rules (user_id, rule_type, symbol, threshold, enabled, created_at, updated_at)
                 VALUES (1, 'pair', NULL, '0.01', 1, 'x', 'x')",
                [],
            )
            .unwrap();

        let active = store.get_active_rules().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].scope, RuleScope::Global);
        assert_eq!(active[0].cooldown_minutes, 5);
    }

    #[test]
    fn test_user_address_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_user_address(7).unwrap(), None);

        store.link_user_address(7, "111").unwrap();
        store.link_user_address(7, "222").unwrap();
        assert_eq!(store.get_user_address(7).unwrap().as_deref(), Some("222"));
    }

    #[test]
    fn test_recent_notification_window() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sent_at = at(0, 0);
        store
            .log_notification_sent(&SendRecord {
                user_id: 1,
                rule_id: 2,
                symbol: "ETH".to_string(),
                threshold: dec!(0.002),
                actual_profit: dec!(0.003),
                sent_at,
            })
            .unwrap();

        let cooldown = Duration::minutes(5);
        // Three minutes later: still inside the window
        assert!(store
            .has_recent_notification(1, 2, "ETH", at(3, 0) - cooldown)
            .unwrap());
        // Just past the window
        assert!(!store
            .has_recent_notification(1, 2, "ETH", at(5, 1) - cooldown)
            .unwrap());
        // Other symbol, rule or user
        assert!(!store.has_recent_notification(1, 2, "BTC", at(1, 0) - cooldown).unwrap());
        assert!(!store.has_recent_notification(1, 3, "ETH", at(1, 0) - cooldown).unwrap());
        assert!(!store.has_recent_notification(9, 2, "ETH", at(1, 0) - cooldown).unwrap());
    }

    #[test]
    fn test_save_and_query_opportunities() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .save_opportunity(&opportunity("BTC", dec!(0.0003), dec!(-0.0002), at(0, 0)))
            .unwrap();
        let stored = store
            .save_opportunity(&opportunity("ETH", dec!(0.004), dec!(-0.003), at(1, 0)))
            .unwrap();
        assert_eq!(stored.risk_level, "high");

        let latest = store.get_latest_opportunities(10).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].symbol, "ETH");
        assert_eq!(latest[0].abs_rate_difference, dec!(0.007));
        assert_eq!(latest[1].rate_b, dec!(-0.0002));
        assert_eq!(latest[1].detected_at, at(0, 0));

        assert_eq!(store.get_latest_opportunities(1).unwrap().len(), 1);
    }

    #[test]
    fn test_unbounded_limit_returns_everything() {
        let store = SqliteStore::open_in_memory().unwrap();
        for minute in 0..3 {
            store
                .save_opportunity(&opportunity("BTC", dec!(0.002), dec!(-0.001), at(minute, 0)))
                .unwrap();
        }

        assert_eq!(store.get_latest_opportunities(usize::MAX).unwrap().len(), 3);
        assert!(store.get_latest_opportunities(0).unwrap().is_empty());
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_rule(1, RuleDraft::new(RuleScope::Global, dec!(0.001), 15).unwrap())
            .unwrap();

        store.init_schema().unwrap();
        store.init_schema().unwrap();

        let rules = store.get_user_rules(1).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].cooldown_minutes, 15);
    }

    #[test]
    fn test_rule_table_without_cooldown_is_migrated() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE notification_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                rule_type TEXT NOT NULL,
                symbol TEXT,
                threshold TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            INSERT INTO notification_rules (user_id, rule_type, symbol, threshold, enabled, created_at, updated_at)
            VALUES (4, 'pair', 'SOL', '0.003', 1, 'x', 'x');
            "#,
        )
        .unwrap();

        let store = SqliteStore::from_connection(conn).unwrap();
        let rules = store.get_user_rules(4).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].scope.symbol(), Some("SOL"));
        assert_eq!(rules[0].cooldown_minutes, 5);
    }

    #[test]
    fn test_schema_errors_are_reported() {
        let conn = Connection::open_in_memory().unwrap();
        // A view under the rules table name cannot be indexed
        conn.execute_batch("CREATE VIEW notification_rules AS SELECT 1 AS id;")
            .unwrap();

        assert!(SqliteStore::from_connection(conn).is_err());
    }

    #[test]
    fn test_market_summary_window() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = at(30, 0);
        store
            .save_opportunity(&opportunity("BTC", dec!(0.001), dec!(-0.001), at(10, 0)))
            .unwrap();
        store
            .save_opportunity(&opportunity("BTC", dec!(0.003), dec!(-0.001), at(20, 0)))
            .unwrap();
        store
            .save_opportunity(&opportunity("ETH", dec!(0.003), dec!(0), at(25, 0)))
            .unwrap();
        // Older than a day
        store
            .save_opportunity(&opportunity(
                "SOL",
                dec!(0.009),
                dec!(0),
                now - Duration::hours(25),
            ))
            .unwrap();

        let summary = store.market_summary_at(now).unwrap();
        assert_eq!(summary.total_pairs, 2);
        assert_eq!(summary.avg_spread, dec!(0.003));
        assert_eq!(summary.top_opportunities[0].symbol, "BTC");
        assert_eq!(summary.top_opportunities[0].abs_rate_difference, dec!(0.004));
        assert_eq!(summary.top_opportunities[1].symbol, "ETH");
    }

    #[test]
    fn test_market_overview_buckets() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = at(30, 0);
        store
            .save_opportunity(&opportunity("BTC", dec!(0.002), dec!(0), at(0, 0)))
            .unwrap();
        store
            .save_opportunity(&opportunity("ETH", dec!(0.004), dec!(0), at(1, 0)))
            .unwrap();
        store
            .save_opportunity(&opportunity("BTC", dec!(0.003), dec!(0), at(29, 59)))
            .unwrap();
        // Outside the 1h window
        store
            .save_opportunity(&opportunity("BTC", dec!(0.05), dec!(0), now - Duration::hours(2)))
            .unwrap();

        let buckets = store.market_overview_at(Timeframe::OneHour, now).unwrap();
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets[0].timestamp, now - Duration::hours(1));

        // 12:00 and 12:01 fall in the 12:00-12:05 bucket
        let busy = &buckets[6];
        assert_eq!(busy.timestamp, at(0, 0));
        assert_eq!(busy.active_opportunities, 2);
        assert_eq!(busy.avg_spread, dec!(0.003));
        assert_eq!(busy.max_profit_potential, dec!(0.004));

        assert_eq!(buckets[11].active_opportunities, 1);
        let total: usize = buckets.iter().map(|b| b.active_opportunities).sum();
        assert_eq!(total, 3);

        assert_eq!(store.market_overview_at(Timeframe::FourHours, now).unwrap().len(), 8);
        assert_eq!(store.market_overview_at(Timeframe::OneDay, now).unwrap().len(), 12);
    }

    #[test]
    fn test_funding_rate_history_buckets() {
        let store = SqliteStore::open_in_memory().unwrap();

        let a = vec![
            FundingRateSample::new("BTC", Exchange::A, dec!(0.0001)).observed_at(at(0, 5)),
            FundingRateSample::new("ETH", Exchange::A, dec!(0.9)).observed_at(at(0, 5)),
        ];
        let b = vec![FundingRateSample::new("BTC", Exchange::B, dec!(-0.0001)).observed_at(at(0, 6))];
        let a_later = vec![
            FundingRateSample::new("BTC", Exchange::A, dec!(0.0002)).observed_at(at(0, 35)),
            FundingRateSample::new("BTC", Exchange::A, dec!(0.0004)).observed_at(at(2, 0)),
        ];

        assert_eq!(store.save_funding_rates(&a, Exchange::A).unwrap(), 2);
        store.save_funding_rates(&b, Exchange::B).unwrap();
        store.save_funding_rates(&a_later, Exchange::A).unwrap();

        let history = store
            .get_funding_rate_history("BTC", at(0, 0), at(10, 0))
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].at, at(0, 0));
        assert_eq!(history[0].rate_a, Some(dec!(0.0002)));
        assert_eq!(history[0].rate_b, Some(dec!(-0.0001)));
        assert_eq!(history[1].at, at(2, 0));
        assert_eq!(history[1].rate_b, None);

        let narrow = store
            .get_funding_rate_history("BTC", at(1, 0), at(10, 0))
            .unwrap();
        assert_eq!(narrow.len(), 1);
    }
}
