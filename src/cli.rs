//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_cache_adapter::{CsvCacheAdapter, read_price_csv, write_price_csv};
use crate::adapters::csv_report_adapter::{CsvReportAdapter, summary_path};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::http_adapter::ReqwestHttp;
use crate::adapters::twse_adapter::{TwseSource, bare_code};
use crate::adapters::yahoo_adapter::YahooSource;
use crate::domain::backtest::{SimulationRecord, simulate};
use crate::domain::error::QuantError;
use crate::domain::metrics::{Report, current_drawdown};
use crate::domain::ohlcv::PriceTable;
use crate::domain::retriever::{CachedRangeRetriever, coverage_gaps};
use crate::domain::strategy::{MeanReversionStrategy, MomentumStrategy, Strategy};
use crate::ports::cache_port::CachePort;
use crate::ports::price_source_port::PriceSource;
use crate::ports::report_port::ReportPort;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "twquant", about = "TWSE daily bar cache and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    Momentum,
    MeanReversion,
}

/// Where daily bars come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DataSource {
    /// Exchange endpoints through the local cache
    Twse,
    /// Yahoo chart API, fetched directly without caching
    #[value(alias = "yf")]
    Yahoo,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch daily bars and write a clean CSV
    Fetch {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = DataSource::Twse)]
        source: DataSource,
        /// Rebuild the cache from this fetch instead of merging into it
        #[arg(long)]
        refresh: bool,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
        #[arg(long, default_value = "data/clean")]
        out_dir: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a single-instrument backtest
    Backtest {
        #[arg(long, default_value = "2330")]
        symbol: String,
        #[arg(long, default_value = "2024-01-01")]
        start: NaiveDate,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = DataSource::Twse)]
        source: DataSource,
        #[arg(long, value_enum, default_value_t = StrategyKind::Momentum)]
        strategy: StrategyKind,
        #[arg(long, default_value_t = 20)]
        lookback: usize,
        /// Read bars from a local CSV instead of the exchange
        #[arg(long)]
        input: Option<PathBuf>,
        /// Write per-bar simulation records to this CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show what the cache holds for a symbol
    CacheInfo {
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Fetch {
            symbol,
            start,
            end,
            source,
            refresh,
            force,
            out_dir,
            config,
        } => load_settings(config.as_deref()).and_then(|settings| {
            let request = FetchRequest {
                symbol: &symbol,
                start,
                end: end.unwrap_or_else(today),
                source,
                refresh,
                force,
                out_dir: &out_dir,
            };
            run_fetch(&settings, &request)
        }),
        Command::Backtest {
            symbol,
            start,
            end,
            source,
            strategy,
            lookback,
            input,
            output,
            config,
        } => load_settings(config.as_deref()).and_then(|settings| {
            let request = BacktestRequest {
                symbol: &symbol,
                start,
                end: end.unwrap_or_else(today),
                source,
                strategy,
                lookback,
                input: input.as_deref(),
                output: output.as_deref(),
            };
            run_backtest(&settings, &request)
        }),
        Command::CacheInfo { symbol, config } => {
            load_settings(config.as_deref()).and_then(|settings| run_cache_info(&settings, &symbol))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Config file (optional) plus environment overrides.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings, QuantError> {
    let adapter = match config_path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            FileConfigAdapter::from_file(path).map_err(|e| QuantError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?
        }
        None => FileConfigAdapter::empty(),
    };
    let mut settings = Settings::from_config(&adapter)?;
    settings.apply_env_overrides(|var| std::env::var(var).ok())?;
    Ok(settings)
}

/// Fetch `[start, end]` for `symbol` through the cache using the configured
/// sources.
pub fn retrieve(
    settings: &Settings,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    force_refresh: bool,
) -> Result<PriceTable, QuantError> {
    let data = &settings.data;
    let http = ReqwestHttp::new(data.timeout)?;

    let twse = TwseSource::new(http.clone())
        .with_base_url(&data.twse_base_url)
        .with_retry(data.retry)
        .with_request_interval(data.request_interval);
    let yahoo = data.fallback.then(|| {
        YahooSource::new(http.clone())
            .with_base_url(&data.yahoo_base_url)
            .with_market_suffix(&data.market_suffix)
            .with_retry(data.retry)
    });
    let cache = CsvCacheAdapter::new(data.cache_dir.clone());

    let mut retriever = CachedRangeRetriever::new(&twse, &cache).with_policy(data.stale_policy);
    if let Some(fallback) = yahoo.as_ref() {
        retriever = retriever.with_fallback(fallback);
    }
    retriever.get(bare_code(symbol), start, end, force_refresh)
}

/// Fetch `[start, end]` from the chosen source. Yahoo bypasses the cache, so
/// `force_refresh` only matters for TWSE.
pub fn fetch_prices(
    settings: &Settings,
    source: DataSource,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    force_refresh: bool,
) -> Result<PriceTable, QuantError> {
    match source {
        DataSource::Twse => retrieve(settings, symbol, start, end, force_refresh),
        DataSource::Yahoo => {
            let data = &settings.data;
            let yahoo = YahooSource::new(ReqwestHttp::new(data.timeout)?)
                .with_base_url(&data.yahoo_base_url)
                .with_market_suffix(&data.market_suffix)
                .with_retry(data.retry);
            yahoo.fetch_range(bare_code(symbol), start, end)
        }
    }
}

pub struct FetchRequest<'a> {
    pub symbol: &'a str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: DataSource,
    pub refresh: bool,
    pub force: bool,
    pub out_dir: &'a Path,
}

fn run_fetch(settings: &Settings, request: &FetchRequest<'_>) -> Result<(), QuantError> {
    let code = bare_code(request.symbol);
    let (start, end, out_dir) = (request.start, request.end, request.out_dir);
    let out_path = out_dir.join(format!("{code}_{start}_{end}.csv"));
    if out_path.exists() && !request.force {
        eprintln!("Skipping: {} exists (use --force to overwrite)", out_path.display());
        return Ok(());
    }

    eprintln!("Fetching {code} {start} -> {end} from {:?}", request.source);
    let table = fetch_prices(settings, request.source, code, start, end, request.refresh)?;
    if table.is_empty() {
        eprintln!("warning: no bars returned, nothing written");
        return Ok(());
    }

    fs::create_dir_all(out_dir)?;
    write_price_csv(&out_path, &table)?;
    eprintln!(
        "Saved {} rows={} range={}->{}",
        out_path.display(),
        table.len(),
        table.first_date().map(|d| d.to_string()).unwrap_or_default(),
        table.last_date().map(|d| d.to_string()).unwrap_or_default(),
    );
    Ok(())
}

pub struct BacktestRequest<'a> {
    pub symbol: &'a str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: DataSource,
    pub strategy: StrategyKind,
    pub lookback: usize,
    pub input: Option<&'a Path>,
    pub output: Option<&'a Path>,
}

fn run_backtest(settings: &Settings, request: &BacktestRequest<'_>) -> Result<(), QuantError> {
    let code = bare_code(request.symbol);
    let (start, end) = (request.start, request.end);

    // Stage 1: Load prices
    let prices = match request.input {
        Some(path) => {
            eprintln!("Using local file {}", path.display());
            read_price_csv(path)?.window(start, end)
        }
        None => load_with_coverage_check(settings, request.source, code, start, end)?,
    };
    if prices.is_empty() {
        return Err(QuantError::EmptyResult {
            instrument: code.to_string(),
            start,
            end,
        });
    }

    // Stage 2: Generate positions and simulate
    let lookback = effective_lookback(request.lookback, prices.len());
    if lookback != request.lookback {
        eprintln!(
            "warning: {} bars is too few for lookback={}, using {}",
            prices.len(),
            request.lookback,
            lookback
        );
    }
    let records = match request.strategy {
        StrategyKind::Momentum => run_strategy(&MomentumStrategy::new(lookback), &prices, settings),
        StrategyKind::MeanReversion => {
            run_strategy(&MeanReversionStrategy::new(lookback), &prices, settings)
        }
    };

    // Stage 3: Summarise
    let report = Report::compute(&records, settings.risk_free_rate);
    print_summary(code, &prices, &report);

    let equity: Vec<f64> = records.iter().map(|r| r.equity).collect();
    let last_ret = records.last().map(|r| r.ret).unwrap_or(0.0);
    if settings
        .kill_switch
        .should_halt(last_ret, current_drawdown(&equity))
    {
        eprintln!("Kill switch:      HALT (daily loss or drawdown beyond limits)");
    }

    // Stage 4: Export records
    if let Some(path) = request.output {
        CsvReportAdapter.write(&records, &report, path)?;
        eprintln!("\nRecords written to: {}", path.display());
        eprintln!("Summary written to: {}", summary_path(path).display());
    }
    Ok(())
}

/// Retrieve prices, re-fetching once with `force_refresh` when the result
/// does not cover the requested window.
fn load_with_coverage_check(
    settings: &Settings,
    source: DataSource,
    code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceTable, QuantError> {
    eprintln!("Fetching {code} {start} -> {end}");
    let prices = fetch_prices(settings, source, code, start, end, false)?;

    let gaps = coverage_gaps(&prices, start, end);
    if gaps.is_empty() {
        return Ok(prices);
    }
    let reasons: Vec<String> = gaps.iter().map(|g| g.to_string()).collect();
    eprintln!("warning: incomplete range ({}), refreshing", reasons.join(", "));

    let refreshed = fetch_prices(settings, source, code, start, end, true)?;
    if refreshed.is_empty() {
        eprintln!("warning: refresh returned no data, keeping original");
        return Ok(prices);
    }
    Ok(refreshed)
}

/// Shrink the lookback for short tables so the strategy is not flat
/// throughout.
pub fn effective_lookback(lookback: usize, bars: usize) -> usize {
    if bars < lookback.saturating_add(2) {
        lookback.min((bars / 3).max(1))
    } else {
        lookback
    }
}

pub fn run_strategy<S: Strategy>(
    strategy: &S,
    prices: &PriceTable,
    settings: &Settings,
) -> Vec<SimulationRecord> {
    eprintln!("Running {} strategy", strategy.name());
    let positions = strategy.generate_positions(prices);
    simulate(prices, &positions, &settings.costs)
}

fn print_summary(code: &str, prices: &PriceTable, report: &Report) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Symbol:           {code}");
    if let (Some(first), Some(last)) = (prices.first_date(), prices.last_date()) {
        eprintln!("Period:           {first} -> {last}");
    }
    eprintln!("Cumulative:       {:.2}%", report.cumulative_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", report.sharpe);
    eprintln!("Max Drawdown:     {:.1}%", report.max_drawdown * 100.0);
    eprintln!("Turnover:         {:.1}", report.turnover_sum);
    eprintln!("Cost:             {:.4}", report.cost_sum);
    eprintln!("Periods:          {}", report.periods);
}

fn run_cache_info(settings: &Settings, symbol: &str) -> Result<(), QuantError> {
    let code = bare_code(symbol);
    let cache = CsvCacheAdapter::new(settings.data.cache_dir.clone());
    let table = cache.load(code)?;
    match (table.first_date(), table.last_date()) {
        (Some(first), Some(last)) => {
            println!(
                "{}: {} bars, {} to {} ({})",
                code,
                table.len(),
                first,
                last,
                cache.csv_path(code).display()
            );
        }
        _ => eprintln!("{code}: not cached"),
    }
    Ok(())
}
