//! Choiatsu CLI - daily high-payout boat race picks

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
#[cfg(feature = "scraper")]
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

use choiatsu::config::{AppConfig, SelectionConfig};
use choiatsu::core::select_bets;
use choiatsu::models::{format_order, Bet, OutcomeTier, PredictionRecord, Race};
use choiatsu::notify::LineNotifier;
use choiatsu::store::{
    analyze_by_venue, recent_records, JsonRecordStore, RecordStatistics, RecordStore,
};

#[cfg(feature = "scraper")]
use choiatsu::notify::{LogNotifier, NotificationSink};
#[cfg(feature = "scraper")]
use choiatsu::runner::{DailyRunner, RunFailure};
#[cfg(feature = "scraper")]
use choiatsu::scraper::{BoatraceScraper, ScraperConfig};
#[cfg(feature = "scraper")]
use choiatsu::store::InMemoryRecordStore;

#[derive(Parser)]
#[command(name = "choiatsu")]
#[command(author, version, about = "High-payout boat race picks and result tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON records file (overrides RECORDS_PATH)
    #[arg(long, global = true)]
    records: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Select today's bets from boatrace.jp, announce and record them
    #[cfg(feature = "scraper")]
    Predict {
        /// Race date (YYYY-MM-DD, default: today in JST)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Log messages instead of broadcasting and keep records in memory
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Fetch posted results for open records and announce outcomes
    #[cfg(feature = "scraper")]
    Results {
        /// Log messages instead of broadcasting
        #[arg(long)]
        dry_run: bool,
    },

    /// Run bet selection over races from a JSON file (offline)
    Select {
        /// JSON array of races
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Show hit rate and payout statistics
    Stats {
        /// Only the most recent N records
        #[arg(long)]
        recent: Option<usize>,
    },

    /// Check the LINE token and send a test broadcast
    NotifyTest {
        #[arg(short, long, default_value = "ちょいアツ艇報 テスト送信です")]
        message: String,
    },
}

/// Overrides for the configured selection parameters
#[derive(clap::Args)]
struct SelectionArgs {
    /// Minimum expected odds
    #[arg(long)]
    min_odds: Option<f64>,

    /// Maximum bets per day
    #[arg(long)]
    max_bets: Option<usize>,

    /// Stake per bet in yen
    #[arg(long)]
    investment: Option<u64>,
}

impl SelectionArgs {
    fn apply(&self, base: &SelectionConfig) -> Result<SelectionConfig> {
        let config = SelectionConfig {
            min_odds: self.min_odds.unwrap_or(base.min_odds),
            max_bets_per_day: self.max_bets.unwrap_or(base.max_bets_per_day),
            investment_per_bet: self.investment.unwrap_or(base.investment_per_bet),
        };
        config.validate().context("Invalid selection options")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = cli.records {
        config.records_path = path;
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    println!("{}", format!("Choiatsu CLI v{}", env!("CARGO_PKG_VERSION")).cyan().bold());
    println!();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        #[cfg(feature = "scraper")]
        Commands::Predict {
            date,
            dry_run,
            selection,
        } => {
            let date = date.unwrap_or_else(today_jst);
            let selection = selection.apply(&config.selection)?;
            rt.block_on(run_predict(&config, date, selection, dry_run))?;
        }
        #[cfg(feature = "scraper")]
        Commands::Results { dry_run } => {
            rt.block_on(run_results(&config, dry_run))?;
        }
        Commands::Select { input, selection } => {
            run_select(&input, &selection.apply(&config.selection)?)?;
        }
        Commands::Stats { recent } => {
            rt.block_on(show_stats(&config.records_path, recent))?;
        }
        Commands::NotifyTest { message } => {
            rt.block_on(notify_test(&config, &message))?;
        }
    }

    Ok(())
}

/// Race days follow Japan time
fn today_jst() -> NaiveDate {
    match FixedOffset::east_opt(9 * 3600) {
        Some(jst) => Utc::now().with_timezone(&jst).date_naive(),
        None => Utc::now().date_naive(),
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

#[cfg(feature = "scraper")]
fn notifier(config: &AppConfig, dry_run: bool) -> Result<Arc<dyn NotificationSink>> {
    match (&config.line_channel_access_token, dry_run) {
        (Some(token), false) => Ok(Arc::new(LineNotifier::new(token.clone())?)),
        (None, false) => {
            println!(
                "{}",
                "LINE_CHANNEL_ACCESS_TOKEN not set; messages will only be logged".yellow()
            );
            Ok(Arc::new(LogNotifier))
        }
        (_, true) => Ok(Arc::new(LogNotifier)),
    }
}

/// Dry runs work on an in-memory copy of the records file
#[cfg(feature = "scraper")]
async fn runner(
    config: &AppConfig,
    selection: SelectionConfig,
    dry_run: bool,
) -> Result<DailyRunner> {
    let scraper =
        BoatraceScraper::new(ScraperConfig::default().with_delay_ms(config.scraper_delay_ms))?;
    let json_store = JsonRecordStore::new(&config.records_path);

    let store: Arc<dyn RecordStore> = if dry_run {
        let records = json_store
            .read_records()
            .await
            .with_context(|| format!("Failed to read records from {:?}", config.records_path))?;
        Arc::new(InMemoryRecordStore::with_records(records))
    } else {
        Arc::new(json_store)
    };

    Ok(DailyRunner::new(
        Arc::new(scraper),
        notifier(config, dry_run)?,
        store,
        selection,
    ))
}

#[cfg(feature = "scraper")]
async fn run_predict(
    config: &AppConfig,
    date: NaiveDate,
    selection: SelectionConfig,
    dry_run: bool,
) -> Result<()> {
    println!(
        "{}: {} (min odds {}x, max {} bets, {}円/bet){}",
        "Predicting".green(),
        date,
        selection.min_odds,
        selection.max_bets_per_day,
        selection.investment_per_bet,
        if dry_run { " [dry-run]" } else { "" }
    );
    println!();

    let runner = runner(config, selection, dry_run).await?;
    let pb = spinner("Fetching races from boatrace.jp...")?;
    let run = runner.run_predictions(date).await;
    pb.finish_and_clear();
    let run = run.with_context(|| format!("Prediction run for {} failed", date))?;

    println!("Races fetched: {}", run.races_fetched);
    print_bets(&run.selection.bets);

    for skipped in &run.selection.skipped {
        println!("{} {}: {:?}", "Skipped".yellow(), skipped.race_name, skipped.reason);
    }
    print_failures(&run.failures);

    if !dry_run {
        println!(
            "\n{}: {} records -> {:?}",
            "Saved".green(),
            run.records.len(),
            config.records_path
        );
    }
    Ok(())
}

#[cfg(feature = "scraper")]
async fn run_results(config: &AppConfig, dry_run: bool) -> Result<()> {
    println!("{}", "Checking results for open records".green());
    println!();

    let runner = runner(config, config.selection.clone(), dry_run).await?;
    let pb = spinner("Fetching results...")?;
    let run = runner.run_results().await;
    pb.finish_and_clear();
    let run = run.context("Results run failed")?;

    if run.resolved.is_empty() && run.pending.is_empty() && run.failures.is_empty() {
        println!("{}", "No open records.".yellow());
        return Ok(());
    }

    print_records(&run.resolved);
    for name in &run.pending {
        println!("{} {}", "Pending".yellow(), name);
    }
    print_failures(&run.failures);
    Ok(())
}

fn run_select(input: &Path, selection: &SelectionConfig) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read races from {:?}", input))?;
    let races: Vec<Race> =
        serde_json::from_str(&raw).with_context(|| format!("Invalid race JSON in {:?}", input))?;

    println!(
        "{}: {} races from {:?}",
        "Selecting".green(),
        races.len(),
        input
    );
    println!();

    let result = select_bets(&races, selection);
    print_bets(&result.bets);
    for skipped in &result.skipped {
        println!("{} {}: {:?}", "Skipped".yellow(), skipped.race_name, skipped.reason);
    }
    Ok(())
}

async fn show_stats(records_path: &Path, recent: Option<usize>) -> Result<()> {
    let store = JsonRecordStore::new(records_path);
    let records = store
        .read_records()
        .await
        .with_context(|| format!("Failed to read records from {:?}", records_path))?;
    let records = recent_records(&records, recent.unwrap_or(records.len()));

    if records.is_empty() {
        println!("{}", "No records yet.".yellow());
        return Ok(());
    }

    let stats = RecordStatistics::from_records(records);
    println!("{}", "成績 (Statistics):".yellow().bold());
    println!("  Records:     {} ({} resolved, {} pending)", stats.total_records, stats.resolved, stats.pending);
    println!("  Hits:        {} ({:.1}%)", stats.hits, stats.hit_rate * 100.0);
    println!("  Payout:      {}円 (avg {:.0}円/hit)", stats.total_payout, stats.average_payout);
    println!("  Investment:  {}円", stats.total_investment);

    let profit = format!("{}円", stats.net_profit);
    println!(
        "  Net profit:  {}  ROI {:.1}%",
        if stats.net_profit >= 0 { profit.green() } else { profit.red() },
        stats.roi * 100.0
    );

    let venues = analyze_by_venue(records);
    if !venues.is_empty() {
        println!("\n{}", "Analysis by Venue:".yellow().bold());
        println!(
            "{:<8} {:>6} {:>6} {:>9} {:>10} {:>9}",
            "Venue", "Bets", "Hits", "Hit Rate", "Payout", "ROI"
        );
        println!("{}", "-".repeat(54));
        for v in venues {
            println!(
                "{:<8} {:>6} {:>6} {:>8.1}% {:>10} {:>8.1}%",
                v.venue,
                v.bets,
                v.hits,
                v.hit_rate * 100.0,
                v.payout,
                v.roi * 100.0
            );
        }
    }

    println!();
    print_records(records);
    Ok(())
}

async fn notify_test(config: &AppConfig, message: &str) -> Result<()> {
    let token = config
        .line_channel_access_token
        .as_deref()
        .context("LINE_CHANNEL_ACCESS_TOKEN is not set")?;
    let notifier = LineNotifier::new(token)?;

    let pb = spinner("Checking LINE bot connection...")?;
    let info = notifier.validate_connection().await;
    pb.finish_and_clear();
    let info = info.context("LINE connection check failed")?;
    println!("{}: {} ({})", "Connected".green(), info.display_name, info.user_id);

    // Insight counts lag by a day
    let yesterday = today_jst().pred_opt().unwrap_or_else(today_jst);
    match notifier.follower_count(yesterday).await {
        Ok(Some(count)) => println!("Followers ({}): {}", yesterday, count),
        Ok(None) => println!("{}", format!("Followers ({}): not ready", yesterday).yellow()),
        Err(e) => println!("{}", format!("Follower count unavailable: {}", e).yellow()),
    }

    notifier
        .send_test_message(message)
        .await
        .context("Test broadcast failed")?;
    println!("{}", "Test message sent".green());
    Ok(())
}

fn print_bets(bets: &[Bet]) {
    if bets.is_empty() {
        println!("{}", "No bets today.".yellow());
        return;
    }

    println!("{}", "本日の推奨 (Selected Bets):".yellow().bold());
    println!(
        "{:<12} {:>6} {:>6} {:>8} {:>8} {:>6}",
        "Race", "Time", "Grade", "Odds", "3連単", "Conf"
    );
    println!("{}", "-".repeat(54));

    for bet in bets {
        println!(
            "{:<12} {:>6} {:>6} {:>8.1} {:>8} {:>5.0}%",
            bet.race.name,
            bet.race.start_time,
            bet.race.grade.as_str(),
            bet.race.expected_odds,
            bet.combination.to_string().cyan(),
            bet.confidence * 100.0
        );
    }
}

fn print_records(records: &[PredictionRecord]) {
    println!(
        "{:<10} {:<12} {:>8} {:>12} {:>8} {:>10}",
        "Date", "Race", "3連単", "Result", "Payout", "Outcome"
    );
    println!("{}", "-".repeat(66));

    for record in records {
        let result = record
            .result_order
            .as_deref()
            .map(format_order)
            .unwrap_or_else(|| "-".to_string());
        let payout = record
            .payout_amount
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        let outcome = match record.outcome_tier() {
            Some(OutcomeTier::Miss) => OutcomeTier::Miss.label().red(),
            Some(tier) => tier.label().green(),
            None => "pending".yellow(),
        };

        println!(
            "{:<10} {:<12} {:>8} {:>12} {:>8} {:>10}",
            record.date, record.race_name, record.combination.to_string(), result, payout, outcome
        );
    }
}

#[cfg(feature = "scraper")]
fn print_failures(failures: &[RunFailure]) {
    for failure in failures {
        println!(
            "{} {} ({}): {}",
            "Failed".red(),
            failure.race_name,
            failure.stage,
            failure.message
        );
    }
}
