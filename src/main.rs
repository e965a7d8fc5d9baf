//! replybot - rate-limited forum reply bot
//!
//! CLI entry point for running the scheduler and inspecting the ledger.

use std::fs;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use replybot::bot::Bot;
use replybot::cli::{Cli, Command, OutputFormat, get_log_path};
use replybot::clock::{Clock, SystemClock};
use replybot::config::Config;
use replybot::content::{ContentFilter, EnglishFilter};
use replybot::generate::LlmCommentGenerator;
use replybot::ledger::Ledger;
use replybot::llm;
use replybot::policy::EligibilityPolicy;
use replybot::prompts::PromptLoader;
use replybot::scheduler::{Scheduler, TokioSleeper};
use replybot::source::RedditClient;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(fmt::layer().with_writer(log_file).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    // Secrets may live in a .env file next to the config
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        "replybot loaded config: provider={}, model={}, sources={}",
        config.llm.provider,
        config.llm.model,
        config.selection.sources.len()
    );

    match cli.command {
        Some(Command::Run) => cmd_run(&config).await,
        Some(Command::Once) => cmd_once(&config).await,
        Some(Command::Status { format }) => cmd_status(&config, format),
        Some(Command::History { limit, format }) => cmd_history(&config, limit, format),
        Some(Command::Logs { lines }) => cmd_logs(lines),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn open_ledger(config: &Config, clock: Arc<dyn Clock>) -> Result<Ledger> {
    Ledger::open(&config.storage.db_path, clock)
        .with_context(|| format!("Failed to open ledger at {}", config.storage.db_path.display()))
}

/// Build a bot wired to Reddit and the configured LLM
fn build_bot(config: &Config) -> Result<Bot> {
    config.validate_credentials()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = open_ledger(config, clock.clone())?;

    let forum = Arc::new(RedditClient::from_config(&config.reddit).context("Failed to create Reddit client")?);
    let llm = llm::create_client(&config.llm).context("Failed to create LLM client")?;
    let prompts = PromptLoader::new(config.llm.prompt_template.as_deref());
    let generator = Arc::new(LlmCommentGenerator::new(llm, prompts));
    let filter: Arc<dyn ContentFilter> = Arc::new(EnglishFilter::new());

    Bot::from_config(config, ledger, clock, forum, generator, filter)
        .context("Failed to load unrecorded replies")
}

/// Run the scheduler until SIGINT/SIGTERM
async fn cmd_run(config: &Config) -> Result<()> {
    let mut bot = build_bot(config)?;
    let mut scheduler = Scheduler::new(config.scheduler.clone(), Arc::new(SystemClock), TokioSleeper);

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    let signal_handle = tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            tracing::error!(error = %e, "Failed to listen for signals");
            return;
        }
        let _ = shutdown_tx.send(()).await;
    });

    info!("replybot running. Press Ctrl+C to stop.");
    let stats = scheduler.run(&mut bot, shutdown_rx).await;
    signal_handle.abort();

    info!(
        attempts = stats.total_attempts,
        failed = stats.total_failed,
        "Shutting down"
    );
    bot.close().context("Failed to close ledger")?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => warn!("SIGINT received"),
        _ = sigterm.recv() => warn!("SIGTERM received"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    warn!("Ctrl+C received");
    Ok(())
}

/// Run one attempt and report the outcome
async fn cmd_once(config: &Config) -> Result<()> {
    let mut bot = build_bot(config)?;
    let result = bot.run_once().await;
    bot.close().context("Failed to close ledger")?;

    let outcome = result.context("Attempt failed")?;
    println!("{} {}", "✓".green(), outcome);
    Ok(())
}

/// Show ledger totals and whether an attempt would be allowed now
fn cmd_status(config: &Config, format: OutputFormat) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = open_ledger(config, clock.clone())?;
    let policy = EligibilityPolicy::from_config(&config.policy, clock);

    let stats = ledger.stats()?;
    let eligibility = policy.check(&ledger)?;
    let pending = ledger.load_pending()?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "db_path": config.storage.db_path.to_string_lossy(),
                "total_actions": stats.total_actions,
                "today": stats.today,
                "max_actions_per_day": policy.max_actions_per_day(),
                "last_action": stats.last_action,
                "unrecorded": pending.len(),
                "eligible": eligibility.is_eligible(),
                "reason": eligibility.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("replybot Status");
            println!("---------------");
            println!("Ledger: {}", config.storage.db_path.display());
            println!("Total replies: {}", stats.total_actions);
            println!("Today: {}/{}", stats.today, policy.max_actions_per_day());
            match stats.last_action {
                Some(last) => println!("Last reply: {}", last.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("Last reply: never"),
            }
            if !pending.is_empty() {
                println!("Unrecorded replies: {}", pending.len().to_string().red());
            }
            if eligibility.is_eligible() {
                println!("Eligible: {}", "yes".green());
            } else {
                println!("Eligible: {} ({})", "no".yellow(), eligibility);
            }
        }
    }

    ledger.close()?;
    Ok(())
}

/// Show the most recent action records
fn cmd_history(config: &Config, limit: usize, format: OutputFormat) -> Result<()> {
    let ledger = open_ledger(config, Arc::new(SystemClock))?;
    let records = ledger.recent_actions(limit)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No replies recorded yet.");
            }
            for record in &records {
                println!(
                    "{} {} {} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    record.source.cyan(),
                    record.item_id,
                    record.action_id.yellow()
                );
            }
        }
    }

    ledger.close()?;
    Ok(())
}

/// Show logs
fn cmd_logs(lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }

    Ok(())
}
