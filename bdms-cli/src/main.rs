//! BDMS CLI: merge, convert and inspect a local market-data archive.
//!
//! Commands:
//! - `merge`: reconcile monthly and daily segments into one file per key
//! - `convert`: rewrite every segment of one format as csv or parquet
//! - `split`: print the monthly/daily partition of a date range
//! - `keys`: list the valid keys a request expands to

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bdms_core::calendar::partition;
use bdms_core::domain::{expand_keys, Interval, MarketDataType, OutputFormat, Registry, StorageFormat, TradingType};
use bdms_core::merge::ContinuityPolicy;
use bdms_runner::{run_convert, run_merge, ConvertConfig, ExecutorProgress, MergeConfig};

#[derive(Parser)]
#[command(name = "bdms", about = "BDMS CLI: continuity-aware merging of market-data archives")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge monthly and daily segments into one file per key.
    Merge(MergeArgs),
    /// Convert segments to csv or parquet next to the originals.
    Convert(ConvertArgs),
    /// Print the monthly and daily units covering [start, end).
    Split {
        /// First date (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// First date not covered (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,
    },
    /// List the keys a request expands to.
    Keys(KeyArgs),
}

#[derive(Args)]
struct KeyArgs {
    /// Symbols (e.g. BTCUSDT,ETHUSDT).
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    symbols: Vec<String>,

    /// Trading types: spot, um, cm.
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    trading_types: Vec<TradingType>,

    /// Data types (e.g. trades,aggTrades,klines).
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    data_types: Vec<MarketDataType>,

    /// Kline intervals (e.g. 1m,1h).
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    intervals: Vec<Interval>,
}

#[derive(Args)]
struct MergeArgs {
    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    keys: KeyArgs,

    /// Archive root holding `data/`.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Output root. Defaults to {root}/merged.
    #[arg(long)]
    merged_root: Option<PathBuf>,

    /// First date to include (YYYY-MM-DD). Defaults to 1970-01-01.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// First date to exclude (YYYY-MM-DD). Defaults to tomorrow.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Segment format: zip, csv, parquet.
    #[arg(long)]
    source_format: Option<StorageFormat>,

    /// Merged format: csv, parquet.
    #[arg(long)]
    output_format: Option<OutputFormat>,

    /// Continuity policy: off, warn, skip, fatal.
    #[arg(long)]
    continuity: Option<ContinuityPolicy>,

    /// Require gap-free trade identifiers across segments.
    #[arg(long, default_value_t = false)]
    strict: bool,

    #[command(flatten)]
    pool: PoolArgs,

    /// Write the JSON report here.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct ConvertArgs {
    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder to scan.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Format to convert from: zip, csv, parquet.
    #[arg(long)]
    input_format: Option<StorageFormat>,

    /// Format to convert to: csv, parquet.
    #[arg(long)]
    output_format: Option<OutputFormat>,

    /// Only scan the top-level folder.
    #[arg(long, default_value_t = false)]
    no_recursive: bool,

    /// Remove each original once its conversion is in place.
    #[arg(long, default_value_t = false)]
    delete_original: bool,

    /// Trading type, to name headerless columns.
    #[arg(long)]
    trading_type: Option<TradingType>,

    /// Data type, to name headerless columns.
    #[arg(long)]
    data_type: Option<MarketDataType>,

    /// Seed for the processing order.
    #[arg(long)]
    seed: Option<u64>,

    #[command(flatten)]
    pool: PoolArgs,

    /// Write the JSON report here.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct PoolArgs {
    /// Worker threads. Defaults to the available parallelism.
    #[arg(long)]
    workers: Option<usize>,

    /// Jobs per worker before it is replaced (0 = unlimited).
    #[arg(long)]
    max_jobs_per_worker: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Commands::Merge(args) => run_merge_cmd(args),
        Commands::Convert(args) => run_convert_cmd(args),
        Commands::Split { start, end } => run_split(start, end),
        Commands::Keys(args) => run_keys(args),
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn track(pb: &ProgressBar, p: &ExecutorProgress) {
    pb.set_length(p.total as u64);
    pb.set_position(p.completed as u64);
    if p.failed > 0 {
        pb.set_message(format!("{} failed", p.failed));
    }
}

fn write_report(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
    info!(report = %path.display(), "report written");
    Ok(())
}

fn run_merge_cmd(args: MergeArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => MergeConfig::from_file(path)?,
        None => MergeConfig::default(),
    };
    if !args.keys.symbols.is_empty() {
        config.symbols = args.keys.symbols;
    }
    if !args.keys.trading_types.is_empty() {
        config.trading_types = args.keys.trading_types;
    }
    if !args.keys.data_types.is_empty() {
        config.data_types = args.keys.data_types;
    }
    if !args.keys.intervals.is_empty() {
        config.intervals = args.keys.intervals;
    }
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(merged_root) = args.merged_root {
        config.merged_root = Some(merged_root);
    }
    config.start = args.start.or(config.start);
    config.end = args.end.or(config.end);
    if let Some(format) = args.source_format {
        config.source_format = format;
    }
    if let Some(format) = args.output_format {
        config.output_format = format;
    }
    if let Some(policy) = args.continuity {
        config.continuity = policy;
    }
    config.strict_identifiers |= args.strict;
    config.executor.workers = args.pool.workers.or(config.executor.workers);
    if let Some(n) = args.pool.max_jobs_per_worker {
        config.executor.max_jobs_per_worker = n;
    }

    if config.symbols.is_empty() || config.data_types.is_empty() {
        bail!("at least one symbol and one data type are required");
    }

    let today = chrono::Local::now().date_naive();
    let pb = progress_bar()?;
    let report = run_merge(&config, Registry::standard(), today, Some(&|p| track(&pb, p)))?;
    pb.finish_and_clear();

    println!("{}", report.summary());
    for entry in &report.merged {
        println!("  merged   {} -> {} ({} rows)", entry.key, entry.destination.display(), entry.rows);
    }
    for entry in &report.skipped {
        println!("  skipped  {}: {}", entry.key, entry.reason);
    }
    for entry in &report.failed {
        println!("  failed   {}: {}", entry.key, entry.failure);
    }

    if let Some(path) = &args.report {
        write_report(path, &report.to_json()?)?;
    }
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_convert_cmd(args: ConvertArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ConvertConfig::from_file(path)?,
        None => ConvertConfig::default(),
    };
    if let Some(dir) = args.input_dir {
        config.input_dir = dir;
    }
    if let Some(format) = args.input_format {
        config.input_format = format;
    }
    if let Some(format) = args.output_format {
        config.output_format = format;
    }
    if args.no_recursive {
        config.recursive = false;
    }
    config.delete_original |= args.delete_original;
    config.trading_type = args.trading_type.or(config.trading_type);
    config.data_type = args.data_type.or(config.data_type);
    config.seed = args.seed.or(config.seed);
    config.executor.workers = args.pool.workers.or(config.executor.workers);
    if let Some(n) = args.pool.max_jobs_per_worker {
        config.executor.max_jobs_per_worker = n;
    }

    let pb = progress_bar()?;
    let report = run_convert(&config, Registry::standard(), Some(&|p| track(&pb, p)))?;
    pb.finish_and_clear();

    println!("{}", report.summary());
    for failure in &report.failed {
        println!("  failed   {}: {}", failure.input.display(), failure.failure);
    }

    if let Some(path) = &args.report {
        write_report(path, &report.to_json()?)?;
    }
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_split(start: NaiveDate, end: NaiveDate) -> Result<()> {
    let parts = partition(start, end)?;
    println!("monthly ({}):", parts.monthly.len());
    for unit in &parts.monthly {
        println!("  {unit}");
    }
    println!("daily ({}):", parts.daily.len());
    for unit in &parts.daily {
        println!("  {unit}");
    }
    Ok(())
}

fn run_keys(args: KeyArgs) -> Result<()> {
    let trading_types = if args.trading_types.is_empty() {
        vec![TradingType::Spot]
    } else {
        args.trading_types
    };
    let keys = expand_keys(
        &args.symbols,
        &trading_types,
        &args.data_types,
        &args.intervals,
        Registry::standard(),
    )?;
    let registry = Registry::standard();
    for key in &keys {
        let since = registry
            .listing_date(key.trading_type())
            .map(|d| format!(" (archive since {d})"))
            .unwrap_or_default();
        println!("{key}{since}");
    }
    Ok(())
}
