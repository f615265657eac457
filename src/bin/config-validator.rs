//! # Calendar Notifier Configuration Validator
//!
//! Command-line tool for validating notifier configuration files before the
//! service is started with them.

use anyhow::{Context, Result};
use calendar_notifier::config::{ConfigManager, NotifierConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Per-section summary
    Table,
    /// Effective configuration with secrets masked
    Json,
}

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate calendar notifier configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, default_value = "config/notifier.yaml")]
    config: PathBuf,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    if let Err(e) = run(&cli) {
        error!("Configuration validation failed: {:#}", e);
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let manager = ConfigManager::load_from_file(&cli.config)
        .with_context(|| format!("invalid configuration file {}", cli.config.display()))?;

    match cli.format {
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(&manager.sanitized())
                .context("failed to render configuration")?;
            println!("{rendered}");
        }
        OutputFormat::Table => print_summary(cli, manager.config())?,
    }

    Ok(())
}

fn print_summary(cli: &Cli, config: &NotifierConfig) -> Result<()> {
    println!("🔧 Validating Calendar Notifier Configuration");
    println!("File: {}", cli.config.display());
    println!();

    println!("📤 Publisher");
    println!("   ✅ URL: {}", config.publisher.url);
    println!("   ✅ Subject: {}", config.publisher.subject);

    println!("📅 Calendars ({})", config.calendars.len());
    for calendar in &config.calendars {
        let ids = if calendar.calendar_ids.is_empty() {
            "all".to_string()
        } else {
            calendar.calendar_ids.join(", ")
        };
        println!(
            "   ✅ {} [{}] every {}s, calendars: {}",
            calendar.name, calendar.provider_type, calendar.poll_interval_seconds, ids
        );
    }

    let scheduler = config.to_scheduler_config()?;
    println!("⏰ Scheduler");
    println!("   ✅ Poll interval: {:?}", scheduler.poll_interval);
    println!("   ✅ Lookahead window: {:?}", scheduler.lookahead_window);
    println!("   ✅ Default lead times: {:?} min", scheduler.default_lead_times);
    match scheduler.final_reminder_minutes {
        Some(minutes) => println!("   ✅ Final reminder: {minutes} min"),
        None => println!("   ℹ️  Final reminder disabled"),
    }
    println!("   ✅ Default severity: {}", scheduler.default_severity);

    let coordinator = config.to_coordinator_config()?;
    println!("🔀 Coordinator");
    if coordinator.deduplication_enabled {
        println!(
            "   ✅ Deduplication window: {:?}, strategy: {}",
            coordinator.deduplication_window,
            coordinator.merge_strategy()
        );
    } else {
        println!("   ℹ️  Deduplication disabled");
    }

    let retry = config.to_retry_config()?;
    println!("🔁 Retry");
    println!(
        "   ✅ {} attempts, {:?} → {:?} (×{})",
        retry.max_attempts, retry.initial_delay, retry.max_delay, retry.backoff_factor
    );

    let breaker = config.to_circuit_breaker_config()?;
    println!("🔌 Circuit Breaker");
    println!(
        "   ✅ Opens after {} failures for {:?}, closes after {} successes",
        breaker.failure_threshold, breaker.open_timeout, breaker.success_threshold
    );

    println!("📝 Logging: level={}, format={}", config.logging.level, config.logging.format);
    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}
