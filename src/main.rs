//! Funding Arbitrage Monitor - Main Entry Point
//!
//! Runs the comparison pipeline on a fixed cadence and provides CLI access to
//! stored history, opportunities and alert rules.

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use funding_arb_monitor::config::Config;
use funding_arb_monitor::error::RuleError;
use funding_arb_monitor::exchange::{
    normalize_symbol, Exchange, ExtendedClient, HyperliquidClient, RateGateway,
};
use funding_arb_monitor::notify::{
    NotificationMatcher, NotificationRule, RuleDraft, RuleScope, RuleUpdate, TelegramChannel,
};
use funding_arb_monitor::persistence::SqliteStore;
use funding_arb_monitor::scheduler::Scheduler;
use funding_arb_monitor::strategy::{FundingMonitor, PairStats, Timeframe};
use funding_arb_monitor::utils::decimal::{format_percent, format_signed_percent};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Funding Arbitrage Monitor CLI
#[derive(Parser)]
#[command(name = "funding-arb-monitor")]
#[command(version, about = "Extended vs Hyperliquid funding rate arbitrage alerts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor until Ctrl-C (default)
    Run,

    /// Run one pass without storing anything and print the result
    Scan {
        /// Also list symbols reported by only one venue
        #[arg(short, long)]
        all: bool,
    },

    /// Show stored funding rate history for a symbol
    History {
        /// Symbol, e.g. BTC or BTC-USD
        #[arg(short, long)]
        symbol: String,

        /// Lookback in hours
        #[arg(long, default_value = "24", value_parser = clap::value_parser!(i64).range(1..))]
        hours: i64,
    },

    /// Show the market summary and opportunity activity over a window
    Dashboard {
        /// One of 1h, 4h, 24h, 7d
        #[arg(short, long, default_value = "24h")]
        timeframe: Timeframe,
    },

    /// Show the most recently detected opportunities
    Opportunities {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Manage alert rules
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },

    /// Link a user to the Telegram chat alerts are delivered to
    LinkChat {
        #[arg(short, long)]
        user: i64,

        #[arg(short, long)]
        chat_id: String,
    },
}

#[derive(Subcommand)]
enum RulesCommand {
    /// List a user's rules
    List {
        #[arg(short, long)]
        user: i64,
    },

    /// Add a rule; without --symbol the rule is global
    Add {
        #[arg(short, long)]
        user: i64,

        #[arg(short, long)]
        symbol: Option<String>,

        /// Minimum absolute rate difference as a fraction (0.002 = 0.2%)
        #[arg(short, long)]
        threshold: Decimal,

        /// Minutes between repeated alerts for one symbol
        #[arg(short, long)]
        cooldown: Option<u32>,
    },

    /// Change a rule
    Update {
        #[arg(long)]
        id: i64,

        #[arg(short, long)]
        user: i64,

        #[arg(long)]
        enabled: Option<bool>,

        #[arg(short, long)]
        threshold: Option<Decimal>,

        #[arg(short, long)]
        cooldown: Option<u32>,
    },

    /// Delete a rule
    Remove {
        #[arg(long)]
        id: i64,

        #[arg(short, long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Scan { all } => scan(&config, all).await,
        Commands::History { symbol, hours } => show_history(&config, &symbol, hours),
        Commands::Opportunities { limit } => show_opportunities(&config, limit),
        Commands::Dashboard { timeframe } => show_dashboard(&config, timeframe),
        Commands::Rules { action } => manage_rules(&config, action),
        Commands::LinkChat { user, chat_id } => {
            let store = open_store(&config)?;
            store.link_user_address(user, chat_id.trim())?;
            println!("✅ User {} linked to chat {}", user, chat_id.trim());
            Ok(())
        }
    }
}

/// Run the scheduler until Ctrl-C.
async fn run(config: Config) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║         Funding Arbitrage Monitor v{}                   ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");
    log_config(&config);

    let store = Arc::new(open_store(&config)?);
    let (gateway_a, gateway_b) = build_gateways(&config)?;

    let mut monitor = FundingMonitor::new(gateway_a, gateway_b, store.clone());
    if config.notifications_enabled() {
        let channel = TelegramChannel::with_api_url(&config.telegram.api_url, &config.telegram.bot_token)?;
        monitor = monitor.with_matcher(NotificationMatcher::new(
            store.clone(),
            store.clone(),
            Arc::new(channel),
        ));
        info!("📨 [INIT] Telegram notifications enabled");
    } else {
        warn!("⚠️  [INIT] No Telegram bot token configured, notifications disabled");
    }

    let scheduler = Scheduler::new(Arc::new(monitor), config.interval());
    scheduler
        .run_until(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await;

    info!("👋 Funding Arbitrage Monitor shutdown complete");
    Ok(())
}

fn build_gateways(config: &Config) -> Result<(Arc<dyn RateGateway>, Arc<dyn RateGateway>)> {
    let extended = ExtendedClient::with_base_url(
        &config.extended.base_url,
        config.extended.timeout(),
        config.extended.markets.clone(),
    )?;
    let hyperliquid =
        HyperliquidClient::with_base_url(&config.hyperliquid.base_url, config.hyperliquid.timeout())?;

    Ok((Arc::new(extended), Arc::new(hyperliquid)))
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    let path = Path::new(&config.database.path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {:?}", parent))?;
    }
    SqliteStore::new(path).context("Failed to open database")
}

/// One side-effect-free pass printed to stdout.
async fn scan(config: &Config, all: bool) -> Result<()> {
    let (gateway_a, gateway_b) = build_gateways(config)?;
    // Nothing is written: the pass runs against a throwaway in-memory store
    let monitor = FundingMonitor::new(gateway_a, gateway_b, Arc::new(SqliteStore::open_in_memory()?));
    let result = monitor.scan().await;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              FUNDING RATE COMPARISON                       ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!(
        "\n📡 {} samples from {}, {} from {}",
        result.samples_a.len(),
        Exchange::A,
        result.samples_b.len(),
        Exchange::B
    );

    println!(
        "\n   {:<10} {:>12} {:>12} {:>12}",
        "Symbol",
        Exchange::A.short_code(),
        Exchange::B.short_code(),
        "Diff"
    );
    for entry in result.table.values() {
        let availability = entry.availability();
        if !availability.has_both && !all {
            continue;
        }
        let rate = |exchange| {
            entry
                .quote(exchange)
                .map(|q| format!("{}%", format_signed_percent(q.funding_rate, 4)))
                .unwrap_or_else(|| "-".to_string())
        };
        let diff = entry
            .rates()
            .map(|(a, b)| format!("{}%", format_signed_percent(a - b, 4)))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   {:<10} {:>12} {:>12} {:>12}",
            entry.symbol,
            rate(Exchange::A),
            rate(Exchange::B),
            diff
        );
    }

    if result.opportunities.is_empty() {
        println!("\n❌ No material divergences");
    } else {
        println!("\n💹 Opportunities");
        for opp in &result.opportunities {
            println!(
                "   ├─ {:<8} {}% ({}) | {} | APR {}%",
                opp.symbol,
                format_percent(opp.abs_rate_difference, 4),
                opp.risk_level,
                opp.direction.label(),
                format_percent(opp.profit.annualized, 2)
            );
        }
    }

    println!();
    Ok(())
}

fn show_history(config: &Config, symbol: &str, hours: i64) -> Result<()> {
    let symbol = normalize_symbol(symbol).with_context(|| format!("Invalid symbol {:?}", symbol))?;
    let store = open_store(config)?;

    let lookback = TimeDelta::try_hours(hours).context("--hours is out of range")?;
    let end = Utc::now();
    let start = end.checked_sub_signed(lookback).context("--hours is out of range")?;
    let history = store.get_funding_rate_history(&symbol, start, end)?;

    println!("\n📈 {} funding history, last {}h ({} points)", symbol, hours, history.len());
    for point in &history {
        let fmt = |rate: Option<Decimal>| {
            rate.map(|r| format!("{}%", format_signed_percent(r, 4)))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "   ├─ {}  {}: {:>10}  {}: {:>10}",
            point.at.format("%Y-%m-%d %H:%M"),
            Exchange::A.short_code(),
            fmt(point.rate_a),
            Exchange::B.short_code(),
            fmt(point.rate_b)
        );
    }

    match PairStats::from_history(&history) {
        Some(stats) => {
            println!("\n📊 Statistics ({} paired points)", stats.samples);
            println!("   ├─ Avg {}:      {}%", Exchange::A, format_signed_percent(stats.avg_rate_a, 4));
            println!("   ├─ Avg {}:   {}%", Exchange::B, format_signed_percent(stats.avg_rate_b, 4));
            println!("   ├─ Max spread:       {}%", format_signed_percent(stats.max_spread, 4));
            println!("   ├─ Min spread:       {}%", format_signed_percent(stats.min_spread, 4));
            println!("   └─ Avg spread:       {}%", format_signed_percent(stats.avg_spread, 4));
        }
        None => println!("\n❌ No points with rates from both venues"),
    }

    println!();
    Ok(())
}

fn show_opportunities(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let opportunities = store.get_latest_opportunities(limit)?;

    if opportunities.is_empty() {
        println!("\n❌ No opportunities recorded yet");
        return Ok(());
    }

    println!("\n💹 Latest opportunities");
    for opp in &opportunities {
        println!(
            "   ├─ {}  {:<8} {}: {:>10}  {}: {:>10}  diff {}% ({})",
            opp.detected_at.format("%Y-%m-%d %H:%M:%S"),
            opp.symbol,
            Exchange::A.short_code(),
            format!("{}%", format_signed_percent(opp.rate_a, 4)),
            Exchange::B.short_code(),
            format!("{}%", format_signed_percent(opp.rate_b, 4)),
            format_percent(opp.abs_rate_difference, 4),
            opp.risk_level
        );
    }
    println!();
    Ok(())
}

fn show_dashboard(config: &Config, timeframe: Timeframe) -> Result<()> {
    let store = open_store(config)?;
    let summary = store.market_summary()?;
    let overview = store.market_overview(timeframe)?;

    println!("\n🧭 Market summary (last 24h)");
    println!("   ├─ Pairs with opportunities: {}", summary.total_pairs);
    println!("   └─ Avg spread:               {}%", format_percent(summary.avg_spread, 4));

    if !summary.top_opportunities.is_empty() {
        println!("\n🏆 Top pairs");
        for opp in &summary.top_opportunities {
            println!(
                "   ├─ {:<8} diff {}% ({}, {})",
                opp.symbol,
                format_percent(opp.abs_rate_difference, 4),
                opp.risk_level,
                opp.detected_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    println!("\n📊 Activity, last {}", timeframe);
    for bucket in &overview {
        println!(
            "   ├─ {}  {:>3} opps  avg {:>8}%  max {:>8}%",
            bucket.timestamp.format("%m-%d %H:%M"),
            bucket.active_opportunities,
            format_percent(bucket.avg_spread, 4),
            format_percent(bucket.max_profit_potential, 4)
        );
    }

    println!();
    Ok(())
}

fn manage_rules(config: &Config, action: RulesCommand) -> Result<()> {
    let store = open_store(config)?;

    match action {
        RulesCommand::List { user } => {
            let rules = store.get_user_rules(user)?;
            if rules.is_empty() {
                println!("\n❌ User {} has no rules", user);
            } else {
                println!("\n🔔 Rules for user {}", user);
                for rule in &rules {
                    print_rule(rule);
                }
            }
        }
        RulesCommand::Add {
            user,
            symbol,
            threshold,
            cooldown,
        } => {
            let scope = match symbol.as_deref() {
                Some(raw) => RuleScope::pair(raw)?,
                None => RuleScope::Global,
            };
            let cooldown = cooldown.unwrap_or(config.notifications.default_cooldown_minutes);
            let rule = store.create_rule(user, RuleDraft::new(scope, threshold, cooldown)?)?;
            println!("\n✅ Rule created");
            print_rule(&rule);
        }
        RulesCommand::Update {
            id,
            user,
            enabled,
            threshold,
            cooldown,
        } => {
            let update = RuleUpdate {
                enabled,
                threshold,
                cooldown_minutes: cooldown,
            };
            update.validate()?;
            anyhow::ensure!(!update.is_empty(), "Nothing to update");

            let rule = store
                .update_rule(id, user, &update)?
                .ok_or(RuleError::NotFound(id))?;
            println!("\n✅ Rule updated");
            print_rule(&rule);
        }
        RulesCommand::Remove { id, user } => {
            if !store.delete_rule(id, user)? {
                return Err(RuleError::NotFound(id).into());
            }
            println!("\n✅ Rule {} deleted", id);
        }
    }

    println!();
    Ok(())
}

fn print_rule(rule: &NotificationRule) {
    println!(
        "   ├─ #{:<4} {:<6} {:<8} ≥{}%  cooldown {}m  {}",
        rule.id,
        rule.scope.to_string(),
        rule.scope.symbol().unwrap_or("*"),
        format_percent(rule.threshold, 2),
        rule.cooldown_minutes,
        if rule.enabled { "enabled" } else { "disabled" }
    );
}

/// Initialize logging with stdout and rolling file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "funding-arb-monitor.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("funding_arb_monitor=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Pass Interval: {}s", config.scheduler.interval_secs);
    info!(
        "   {}: {} ({} markets, timeout {}s)",
        Exchange::A,
        config.extended.base_url,
        config.extended.markets.len(),
        config.extended.timeout_secs
    );
    info!(
        "   {}: {} (timeout {}s)",
        Exchange::B,
        config.hyperliquid.base_url,
        config.hyperliquid.timeout_secs
    );
    info!("   Database: {}", config.database.path);
    info!(
        "   Default Cooldown: {}m",
        config.notifications.default_cooldown_minutes
    );
}
