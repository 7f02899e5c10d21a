//! Sumi-Frontier main entry point
//!
//! This is the command-line interface for the Sumi-Frontier crawl frontier.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_frontier::checkpoint::{self, Checkpointer};
use sumi_frontier::config::{load_config_with_hash, Config};
use sumi_frontier::Frontier;
use tracing_subscriber::EnvFilter;

/// Sumi-Frontier: the scheduling core of a polite web crawler
///
/// Sumi-Frontier deduplicates discovered URIs, queues them per host, enforces
/// robots.txt and quotas at dispatch time, and checkpoints its state so a crawl
/// can resume after a restart.
#[derive(Parser, Debug)]
#[command(name = "sumi-frontier")]
#[command(version = "1.0.0")]
#[command(about = "A polite crawl frontier", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Recover the latest valid checkpoint instead of starting empty
    #[arg(long)]
    resume: bool,

    /// Write a checkpoint after seeds are scheduled
    #[arg(long)]
    checkpoint: bool,

    /// Validate config and show what would be scheduled
    #[arg(long, conflicts_with_all = ["stats", "resume", "checkpoint"])]
    dry_run: bool,

    /// Recover the checkpoint in CHECKPOINT_DIR, print its statistics and exit
    #[arg(long, value_name = "CHECKPOINT_DIR", conflicts_with_all = ["dry_run", "resume", "checkpoint"])]
    stats: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).context("invalid configuration");
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if let Some(dir) = &cli.stats {
        handle_stats(&config, &config_hash, dir)?;
    } else {
        handle_run(config, config_hash, cli.resume, cli.checkpoint)?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_frontier=info,warn"),
            1 => EnvFilter::new("sumi_frontier=debug,info"),
            2 => EnvFilter::new("sumi_frontier=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Frontier Dry Run ===\n");

    let f = &config.frontier;
    println!("Frontier:");
    println!("  Queue assignment: {:?}", f.queue_assignment);
    println!("  Max deferrals: {}", f.max_deferrals);
    println!("  Max retries: {}", f.max_retries);
    println!("  Retry delay: {}s", f.retry_delay_seconds);
    println!(
        "  Politeness: {}x fetch time, {}ms..{}ms",
        f.delay_factor, f.min_delay_ms, f.max_delay_ms
    );
    println!("  Respect Crawl-delay: {}", f.respect_crawl_delay);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nRobots:");
    println!("  Honoring policy: {}", config.robots.honoring_policy);
    println!("  Validity: {}h", config.robots.validity_hours);

    println!("\nQuotas:");
    let q = &config.quotas;
    for (name, value) in [
        ("server-max-fetch-successes", q.server_max_fetch_successes),
        ("server-max-success-kb", q.server_max_success_kb),
        ("server-max-fetch-responses", q.server_max_fetch_responses),
        ("server-max-total-kb", q.server_max_total_kb),
        ("host-max-fetch-successes", q.host_max_fetch_successes),
        ("host-max-success-kb", q.host_max_success_kb),
        ("host-max-fetch-responses", q.host_max_fetch_responses),
        ("host-max-total-kb", q.host_max_total_kb),
        ("group-max-fetch-successes", q.group_max_fetch_successes),
        ("group-max-success-kb", q.group_max_success_kb),
        ("group-max-fetch-responses", q.group_max_fetch_responses),
        ("group-max-total-kb", q.group_max_total_kb),
    ] {
        if value >= 0 {
            println!("  {}: {}", name, value);
        }
    }
    println!("  force-retire: {}", q.force_retire);

    println!("\nRevisit:");
    println!("  Enabled: {}", config.revisit.enabled);
    println!(
        "  Wait: initial {}s, min {}s, max {}s, default {}s",
        config.revisit.initial_wait_seconds,
        config.revisit.min_wait_seconds,
        config.revisit.max_wait_seconds,
        config.revisit.default_wait_seconds
    );

    println!("\nFingerprints:");
    println!(
        "  Store: {:?} (2^{} slots)",
        config.fingerprints.store, config.fingerprints.capacity_bits
    );

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: recovers a checkpoint and prints its report
fn handle_stats(config: &Config, config_hash: &str, dir: &Path) -> anyhow::Result<()> {
    println!("Checkpoint: {}\n", dir.display());
    let frontier = checkpoint::recover(dir, config, Some(config_hash))
        .with_context(|| format!("failed to recover {}", dir.display()))?;
    println!("{}", frontier.report());
    Ok(())
}

/// Handles the default mode: builds or recovers a frontier and schedules seeds
fn handle_run(
    config: Config,
    config_hash: String,
    resume: bool,
    write_checkpoint: bool,
) -> anyhow::Result<()> {
    let mut checkpointer = Checkpointer::new(&config.checkpoint)
        .context("failed to scan checkpoint directory")?
        .with_config_hash(config_hash.clone());

    let latest = if resume {
        checkpointer.latest_valid()?
    } else {
        None
    };
    let frontier = match latest {
        Some(dir) => {
            tracing::info!("Resuming from checkpoint {}", dir.display());
            checkpoint::recover(&dir, &config, Some(&config_hash))
                .with_context(|| format!("failed to recover {}", dir.display()))?
        }
        None => {
            if resume {
                tracing::warn!("No valid checkpoint to resume; starting empty");
            }
            Frontier::from_config(&config).context("failed to open fingerprint store")?
        }
    };

    let added = frontier
        .schedule_seeds(&config.seeds)
        .context("failed to schedule seeds")?;
    tracing::info!("Scheduled {} new seed URIs", added);

    println!("{}", frontier.report());

    if write_checkpoint {
        let dir = checkpointer
            .checkpoint(&frontier)
            .context("checkpoint failed")?;
        println!("\n✓ Checkpoint written to: {}", dir.display());
    }

    Ok(())
}
