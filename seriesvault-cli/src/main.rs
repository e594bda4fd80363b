//! SeriesVault CLI: download, load, and cache management commands.
//!
//! Commands:
//! - `download` — fetch series concurrently, align them, and cache them in SQLite
//! - `load` — print or export cached series
//! - `status` — per-ticker coverage of the cache
//! - `reset` — drop every cached row

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use seriesvault_core::provider::{LocalCsvProvider, SyntheticProvider};
use seriesvault_core::store::DB_FILE;
use seriesvault_core::{
    AlignedTable, CacheStore, DownloadRun, Downloader, FetchRequest, ProviderRegistry, RunConfig,
    TracingProgress,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "seriesvault",
    about = "SeriesVault CLI — concurrent time-series download and SQLite cache"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch series, align them on a daily calendar, and cache the result.
    Download {
        /// Requests as PROVIDER:SYMBOL (e.g., yahoo:XHB fred:CPIAUCSL).
        requests: Vec<String>,

        /// TOML run config. Flags given on the command line override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start date (YYYY-MM-DD). Defaults to 1970-01-01.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to 2023-12-01.
        #[arg(long)]
        end: Option<String>,

        /// Maximum concurrent fetches. Defaults to 5.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Skip writing the aligned table to the cache.
        #[arg(long, default_value_t = false)]
        no_save: bool,

        /// Directory holding prices.db. Defaults to ./data.
        #[arg(long)]
        base_path: Option<PathBuf>,

        /// Per-request HTTP timeout in seconds. Defaults to 30.
        #[arg(long)]
        timeout: Option<u64>,

        /// Directory read by the `csv` provider ({dir}/{symbol}.csv).
        #[arg(long, default_value = ".")]
        csv_dir: PathBuf,

        /// Also write the aligned table to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Also write the aligned table to this Parquet file.
        #[arg(long)]
        parquet: Option<PathBuf>,
    },
    /// Print or export cached series.
    Load {
        /// Symbols to load.
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Directory holding prices.db. Defaults to ./data.
        #[arg(long, default_value = "data")]
        base_path: PathBuf,

        /// Write the table to this CSV file instead of printing it.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Report per-ticker coverage of the cache.
    Status {
        /// Directory holding prices.db. Defaults to ./data.
        #[arg(long, default_value = "data")]
        base_path: PathBuf,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Drop every cached row and recreate the empty table.
    Reset {
        /// Directory holding prices.db. Defaults to ./data.
        #[arg(long, default_value = "data")]
        base_path: PathBuf,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

/// Command-line values that replace fields of the run config.
struct DownloadArgs {
    requests: Vec<String>,
    config: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    concurrency: Option<usize>,
    no_save: bool,
    base_path: Option<PathBuf>,
    timeout: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            requests,
            config,
            start,
            end,
            concurrency,
            no_save,
            base_path,
            timeout,
            csv_dir,
            csv,
            parquet,
        } => {
            let args = DownloadArgs {
                requests,
                config,
                start,
                end,
                concurrency,
                no_save,
                base_path,
                timeout,
            };
            run_download(args, csv_dir, csv, parquet)
        }
        Commands::Load {
            symbols,
            base_path,
            csv,
        } => run_load(&symbols, &base_path, csv),
        Commands::Status { base_path, json } => run_status(&base_path, json),
        Commands::Reset { base_path, confirm } => run_reset(&base_path, confirm),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn build_config(args: DownloadArgs) -> Result<RunConfig> {
    let mut cfg = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };

    if !args.requests.is_empty() {
        cfg.requests = args
            .requests
            .iter()
            .map(|r| r.parse::<FetchRequest>())
            .collect::<Result<Vec<_>, _>>()?;
    }
    if let Some(start) = args.start.as_deref() {
        cfg.start_date = parse_date(start)?;
    }
    if let Some(end) = args.end.as_deref() {
        cfg.end_date = parse_date(end)?;
    }
    if let Some(concurrency) = args.concurrency {
        cfg.concurrency = concurrency;
    }
    if args.no_save {
        cfg.save = false;
    }
    if let Some(base_path) = args.base_path {
        cfg.base_path = base_path;
    }
    if let Some(timeout) = args.timeout {
        cfg.fetch_timeout_secs = timeout;
    }
    Ok(cfg)
}

fn run_download(
    args: DownloadArgs,
    csv_dir: PathBuf,
    csv: Option<PathBuf>,
    parquet: Option<PathBuf>,
) -> Result<()> {
    let cfg = build_config(args)?;

    let mut registry = ProviderRegistry::with_defaults(cfg.fetch_timeout());
    registry.register(Arc::new(LocalCsvProvider::new(csv_dir)));
    registry.register(Arc::new(SyntheticProvider::new()));

    if !cfg.base_path.exists() {
        info!(path = %cfg.base_path.display(), "creating data directory");
    }

    let mut downloader = Downloader::new(cfg, registry, Arc::new(TracingProgress))?;
    let run = downloader.run();

    print_run(&run);

    if let Some(path) = csv {
        run.table.write_csv(&path)?;
        println!("Wrote CSV: {}", path.display());
    }
    if let Some(path) = parquet {
        run.table.write_parquet(&path)?;
        println!("Wrote Parquet: {}", path.display());
    }

    Ok(())
}

fn open_existing(base_path: &Path) -> Result<Option<CacheStore>> {
    let db = base_path.join(DB_FILE);
    if !db.exists() {
        println!("Cache database does not exist: {}", db.display());
        return Ok(None);
    }
    let store = CacheStore::open(&db)?;
    store.initialize()?;
    Ok(Some(store))
}

fn run_load(symbols: &[String], base_path: &Path, csv: Option<PathBuf>) -> Result<()> {
    let Some(store) = open_existing(base_path)? else {
        return Ok(());
    };

    let table = store.load(symbols)?;
    if table.is_empty() {
        println!("No cached rows for: {}", symbols.join(", "));
        return Ok(());
    }

    match csv {
        Some(path) => {
            table.write_csv(&path)?;
            println!(
                "Wrote {} rows x {} symbols to {}",
                table.height(),
                table.width(),
                path.display()
            );
        }
        None => print_table(&table),
    }
    Ok(())
}

fn run_status(base_path: &Path, json: bool) -> Result<()> {
    let Some(store) = open_existing(base_path)? else {
        return Ok(());
    };

    let tickers = store.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tickers)?);
        return Ok(());
    }

    if tickers.is_empty() {
        println!("Cache is empty: {}", base_path.join(DB_FILE).display());
        return Ok(());
    }

    println!("Cache: {}", base_path.join(DB_FILE).display());
    println!("Tickers: {}", tickers.len());
    println!("Rows: {}", store.row_count()?);
    println!();
    println!("{:<12} {:<25} {:>10}", "Ticker", "Date Range", "Rows");
    println!("{}", "-".repeat(49));
    for t in &tickers {
        println!(
            "{:<12} {:<25} {:>10}",
            t.ticker,
            format!("{} to {}", t.first_date, t.last_date),
            t.rows
        );
    }
    Ok(())
}

fn run_reset(base_path: &Path, confirm: bool) -> Result<()> {
    let Some(store) = open_existing(base_path)? else {
        return Ok(());
    };

    let rows = store.row_count()?;
    let tickers = store.status()?.len();
    println!("Cache holds {rows} row(s) across {tickers} ticker(s).");

    if !confirm {
        println!();
        println!("Dry run — pass --confirm to actually delete.");
        return Ok(());
    }

    store.drop_table()?;
    store.initialize()?;
    if store.row_count()? != 0 {
        bail!("cache table was not emptied");
    }
    println!("Done. Removed {rows} row(s).");
    Ok(())
}

fn print_run(run: &DownloadRun) {
    let summary = &run.summary;
    println!();
    println!("=== Download Result ===");
    println!(
        "Requests:       {} ({} ok, {} failed)",
        summary.total, summary.succeeded, summary.failed
    );
    for (request, err) in &summary.failures {
        println!("  FAILED {request}: {err}");
    }
    match (run.table.dates().first(), run.table.dates().last()) {
        (Some(first), Some(last)) => println!("Period:         {first} to {last}"),
        _ => println!("Period:         (empty)"),
    }
    println!(
        "Table:          {} rows x {} symbols",
        run.table.height(),
        run.table.width()
    );
    println!("Hash:           {}", run.table.content_hash());
    match run.inserted {
        Some(n) => println!("Cached:         {n} new row(s)"),
        None => println!("Cached:         not saved"),
    }
    println!();
}

fn print_table(table: &AlignedTable) {
    print!("{:<12}", "date");
    for sym in table.symbols() {
        print!(" {sym:>12}");
    }
    println!();
    for (date, row) in table.dates().iter().zip(table.rows()) {
        print!("{:<12}", date.to_string());
        for v in row {
            if v.is_nan() {
                print!(" {:>12}", "");
            } else {
                print!(" {v:>12.4}");
            }
        }
        println!();
    }
}
