//! Factor backtest CLI
//!
//! # List the most traded USDT pairs
//! backtest top --n 10
//!
//! # Warm the parquet cache
//! backtest fetch --symbols BTC/USDT,ETH/USDT
//!
//! # Momentum long/short on the top 10 pairs, monthly rebalance
//! backtest run --top 10 --factor momentum --lookback 21 --rebalance-every 21

use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use factor_lab::backtest::TRADING_DAYS_PER_YEAR;
use factor_lab::{
    align_universe, compute_metrics, run_backtest, signal_matrix, AppConfig, BacktestParams,
    ExchangeClient, Factor, Frequency, ParquetCache, PerformanceMetrics, PriceStore,
};

#[derive(Parser)]
#[command(name = "backtest")]
#[command(about = "Cross-sectional factor backtests on exchange price history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the top symbols by quote volume
    Top {
        #[arg(short, long, default_value_t = 10)]
        n: usize,

        #[arg(short, long, default_value = "USDT")]
        quote: String,
    },

    /// Download bars into the cache
    Fetch {
        /// Comma-separated symbols, e.g. BTC/USDT,ETH/USDT
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        #[arg(short, long, default_value = "1d")]
        timeframe: String,

        /// Ignore cached files and download again
        #[arg(long)]
        refresh: bool,
    },

    /// Fetch, align, compute a factor and backtest it
    Run(RunArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum FactorKind {
    Momentum,
    MeanReversion,
    Ewma,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Explicit universe (comma-separated); overrides --top
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Use the N most traded symbols when --symbols is absent
    #[arg(long, default_value_t = 10)]
    top: usize,

    #[arg(long, default_value = "USDT")]
    quote: String,

    #[arg(short, long, default_value = "1d")]
    timeframe: String,

    /// Resampling frequency for the aligned universe
    #[arg(long, default_value = "1D")]
    freq: Frequency,

    #[arg(long, value_enum, default_value_t = FactorKind::Momentum)]
    factor: FactorKind,

    #[arg(long, default_value_t = 21)]
    lookback: usize,

    #[arg(long, default_value_t = 12)]
    fast: usize,

    #[arg(long, default_value_t = 26)]
    slow: usize,

    #[arg(long, default_value_t = 20)]
    std_window: usize,

    #[arg(long, default_value_t = 0.9)]
    top_q: f64,

    #[arg(long, default_value_t = 0.1)]
    bottom_q: f64,

    #[arg(long, default_value_t = 21)]
    rebalance_every: usize,

    /// Cost per unit of turnover, as a raw rate (0.001 = 10 bps)
    #[arg(long, default_value_t = 0.0)]
    cost: f64,

    #[arg(long)]
    long_only: bool,

    #[arg(long)]
    refresh: bool,
}

impl RunArgs {
    fn factor(&self) -> Factor {
        match self.factor {
            FactorKind::Momentum => Factor::Momentum { lookback: self.lookback },
            FactorKind::MeanReversion => Factor::MeanReversion { lookback: self.lookback },
            FactorKind::Ewma => Factor::EwmaCrossover {
                fast: self.fast,
                slow: self.slow,
                std_window: self.std_window,
            },
        }
    }

    fn params(&self) -> BacktestParams {
        BacktestParams {
            top_q: self.top_q,
            bottom_q: self.bottom_q,
            rebalance_every: self.rebalance_every,
            transaction_cost_bps: self.cost,
            long_short: !self.long_only,
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    factor: Factor,
    symbols: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    params: BacktestParams,
    metrics: PerformanceMetrics,
    turnover_total: f64,
    rebalance_count: usize,
    final_equity: f64,
    elapsed_ms: u128,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("factor_lab=info,backtest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("loading configuration")?;
    let client = ExchangeClient::new(config.exchange.clone()).context("building exchange client")?;
    let store = PriceStore::new(client, ParquetCache::new(&config.cache_dir));

    let outcome = match cli.command {
        Commands::Top { n, quote } => {
            for symbol in store.top_symbols(n, &quote).await {
                println!("{}", symbol);
            }
            Ok(())
        }
        Commands::Fetch { symbols, timeframe, refresh } => fetch(&store, &symbols, &timeframe, refresh).await,
        Commands::Run(args) => run(&store, &args).await,
    };

    let (client, _) = store.into_parts();
    info!(requests = client.request_count(), "done");
    client.close();
    outcome
}

async fn fetch(store: &PriceStore, symbols: &[String], timeframe: &str, refresh: bool) -> Result<()> {
    for symbol in symbols {
        let table = store
            .fetch_cached(symbol, timeframe, refresh)
            .await
            .with_context(|| format!("fetching {}", symbol))?;
        let path = store.cache().path(symbol, timeframe);
        println!("{}: {} bars -> {}", symbol, table.len(), path.display());
    }
    Ok(())
}

async fn run(store: &PriceStore, args: &RunArgs) -> Result<()> {
    let started = Instant::now();

    let symbols = if args.symbols.is_empty() {
        store.top_symbols(args.top, &args.quote).await
    } else {
        args.symbols.clone()
    };

    let bars = store.load_universe(&symbols, &args.timeframe, args.refresh).await;
    let prices = align_universe(&bars, args.freq);
    if prices.is_empty() {
        bail!("no price history for any of {:?}", symbols);
    }
    info!(rows = prices.n_rows(), symbols = prices.n_cols(), "universe aligned");

    let factor = args.factor();
    let params = args.params();
    let signals = signal_matrix(&prices, factor);
    let result = run_backtest(&signals, &prices, &params);

    let mut metrics = compute_metrics(&result.daily_returns.values, TRADING_DAYS_PER_YEAR);
    metrics.avg_turnover = result.summary.turnover_mean;

    let report = Report {
        factor,
        symbols: prices.columns.clone(),
        start: prices.index.first().map(|t| t.to_rfc3339()),
        end: prices.index.last().map(|t| t.to_rfc3339()),
        params,
        metrics,
        turnover_total: result.summary.turnover_total,
        rebalance_count: result.summary.rebalance_count,
        final_equity: result.cumulative.last().unwrap_or(1.0),
        elapsed_ms: started.elapsed().as_millis(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
