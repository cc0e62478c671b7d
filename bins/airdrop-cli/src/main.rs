//! Airdrop calculator binary.
//!
//! Replays an ERC-20 token's transfer history, distributes a fixed budget
//! over the configured block window in proportion to time-weighted balances,
//! and writes the ranked reward list as JSON.

mod config;
mod output;

use std::path::PathBuf;
use std::process;

use airdrop_core::{
    Address, EmissionSchedule, EventSource, TransferSemantics, collect_events, resolve_window,
};
use airdrop_source::{EthRpcSource, SnapshotSource, capture};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use crate::config::{AirdropConfig, SourceKind};

/// Time-weighted retroactive token airdrop calculator.
#[derive(Parser, Debug)]
#[command(name = "airdrop", version, about = "Time-weighted retroactive token airdrop calculator")]
struct Cli {
    /// Configuration file (TOML, JSON or YAML). Defaults to ./airdrop.toml
    /// when present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay transfers and write the reward list.
    Compute(ComputeArgs),
    /// Record transfers and block timestamps into an offline snapshot file.
    Snapshot(SnapshotArgs),
}

/// Flags shared by every command. Each one overrides the file and
/// environment value of the same name.
#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Token contract address.
    #[arg(long)]
    token: Option<Address>,

    /// First block of the emission window.
    #[arg(long)]
    start_block: Option<u64>,

    /// Last block of the emission window.
    #[arg(long)]
    end_block: Option<u64>,

    /// Ethereum JSON-RPC endpoint.
    #[arg(long, conflicts_with = "snapshot")]
    rpc_url: Option<String>,

    /// Offline snapshot file to read events from.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Maximum block span per eth_getLogs request.
    #[arg(long)]
    log_chunk_size: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,
}

#[derive(Args, Debug)]
struct ComputeArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Airdrop budget in whole tokens.
    #[arg(long)]
    amount: Option<u64>,

    /// Token decimals used to scale the budget.
    #[arg(long)]
    decimals: Option<u32>,

    /// How non-mint transfers move balances ("sender-only" or "standard").
    #[arg(long)]
    semantics: Option<TransferSemantics>,

    /// Reward list destination.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Snapshot file to write.
    #[arg(short, long)]
    out: PathBuf,
}

impl SourceArgs {
    fn apply(self, config: &mut AirdropConfig) {
        if let Some(token) = self.token {
            config.token_address = Some(token);
        }
        if let Some(v) = self.start_block {
            config.start_block = v;
        }
        if let Some(v) = self.end_block {
            config.end_block = v;
        }
        if let Some(url) = self.rpc_url {
            config.rpc_url = Some(url);
            config.snapshot = None;
        }
        if let Some(path) = self.snapshot {
            config.snapshot = Some(path);
            config.rpc_url = None;
        }
        if self.log_chunk_size.is_some() {
            config.log_chunk_size = self.log_chunk_size;
        }
        if let Some(v) = self.log_level {
            config.log_level = v;
        }
        if let Some(v) = self.log_format {
            config.log_format = v;
        }
    }
}

impl ComputeArgs {
    fn apply(self, config: &mut AirdropConfig) {
        if let Some(v) = self.amount {
            config.airdrop_amount = v;
        }
        if let Some(v) = self.decimals {
            config.decimals = v;
        }
        if let Some(v) = self.semantics {
            config.transfer_semantics = v;
        }
        if let Some(v) = self.output {
            config.output = v;
        }
        self.source.apply(config);
    }
}

/// What to do once configuration is resolved.
enum Task {
    Compute,
    Snapshot(PathBuf),
}

fn resolve(cli: Cli) -> Result<(AirdropConfig, Task)> {
    let mut config = AirdropConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Compute(args) => {
            args.apply(&mut config);
            config.validate()?;
            Ok((config, Task::Compute))
        }
        Commands::Snapshot(args) => {
            args.source.apply(&mut config);
            config.validate_source()?;
            Ok((config, Task::Snapshot(args.out)))
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (config, task) = match resolve(cli) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    };

    init_logging(&config.log_level, &config.log_format);
    info!("airdrop v{}", env!("CARGO_PKG_VERSION"));

    let result = match task {
        Task::Compute => compute(&config).await,
        Task::Snapshot(out) => snapshot(&config, out).await,
    };
    if let Err(e) = result {
        error!("{e:#}");
        process::exit(1);
    }
}

fn open_source(config: &AirdropConfig) -> Result<Box<dyn EventSource>> {
    match config.source_kind()? {
        SourceKind::Rpc(rpc) => {
            info!(url = %rpc.url, chunk = ?rpc.log_chunk_size, "using JSON-RPC source");
            let source = EthRpcSource::new(rpc).context("failed to create RPC client")?;
            Ok(Box::new(source))
        }
        SourceKind::Snapshot(path) => {
            info!(path = %path.display(), "using snapshot source");
            let source = SnapshotSource::from_file(&path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            Ok(Box::new(source))
        }
    }
}

/// Resolve the window, replay every transfer and write the reward list.
async fn compute(config: &AirdropConfig) -> Result<()> {
    let token = config.token()?;
    let source = open_source(config)?;

    let window = resolve_window(source.as_ref(), config.start_block, config.end_block)
        .await
        .context("failed to resolve emission window")?;
    let schedule = EmissionSchedule::new(window, config.scaled_amount())
        .context("invalid emission window")?;
    info!(
        start_block = window.start_block,
        end_block = window.end_block,
        start_timestamp = window.start_timestamp,
        end_timestamp = window.end_timestamp,
        total = %schedule.total_amount(),
        rate = %schedule.rate(),
        "emission schedule"
    );

    let events = collect_events(source.as_ref(), &token, config.end_block)
        .await
        .context("failed to collect transfer events")?;

    let outcome = airdrop_core::run(&events, &schedule, config.transfer_semantics)
        .context("allocation failed")?;

    output::write_rewards(&config.output, &outcome.rewards)?;
    info!(
        path = %config.output.display(),
        entries = outcome.rewards.len(),
        intervals = outcome.intervals.len(),
        "reward list written"
    );

    println!("{}", output::render_summary(&outcome.summary));
    Ok(())
}

/// Capture everything a compute run needs into a snapshot file.
async fn snapshot(config: &AirdropConfig, out: PathBuf) -> Result<()> {
    let token = config.token()?;
    let source = open_source(config)?;

    let snapshot = capture(source.as_ref(), &token, config.start_block, config.end_block)
        .await
        .context("failed to capture snapshot")?;
    snapshot
        .save(&out)
        .with_context(|| format!("failed to write snapshot {}", out.display()))?;
    info!(
        path = %out.display(),
        blocks = snapshot.blocks.len(),
        transfers = snapshot.transfers.len(),
        "snapshot written"
    );
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG`, when set, takes precedence over `level_str`.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    // Logs go to stderr; stdout carries the summary.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
