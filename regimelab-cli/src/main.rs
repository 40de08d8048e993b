//! RegimeLab CLI: latest-bar predictions, backtests, weight training.
//!
//! Commands:
//! - `predict`: score the most recent bar of each symbol
//! - `backtest`: replay history per symbol, optionally static vs adaptive
//! - `train`: build a corpus, train regime weights, save the store
//! - `weights show`: print the contents of a saved weight store
//!
//! Logging goes to stderr via `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use regimelab_core::backtest::Backtester;
use regimelab_core::weights::{Category, WeightStore};
use regimelab_runner::{
    compare_weighting, load_universe, predict_latest, predictor_for, provider_for,
    replay_universe, train_from_config, BatchReport, DataSourceKind, LoadedUniverse,
    RegimeLabConfig, SignalReport, TickerOutcome, WeightMode, WeightingComparison,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "regimelab",
    about = "RegimeLab CLI: regime-adaptive technical scoring and backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Symbols, comma separated. Overrides `data.symbols`.
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Data source. Overrides `data.source`.
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// Weight store path. Overrides `weights.store_path`.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Write the full result as JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Csv,
    Synthetic,
    Yahoo,
}

impl From<SourceArg> for DataSourceKind {
    fn from(s: SourceArg) -> Self {
        match s {
            SourceArg::Csv => DataSourceKind::Csv,
            SourceArg::Synthetic => DataSourceKind::Synthetic,
            SourceArg::Yahoo => DataSourceKind::Yahoo,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score the latest bar of each symbol.
    Predict {
        #[command(flatten)]
        common: CommonArgs,

        /// Use trained regime-adaptive weights.
        #[arg(long, default_value_t = false)]
        adaptive: bool,
    },
    /// Replay history bar by bar for each symbol.
    Backtest {
        #[command(flatten)]
        common: CommonArgs,

        /// Use trained regime-adaptive weights.
        #[arg(long, default_value_t = false)]
        adaptive: bool,

        /// Replay with static and adaptive weights and compare.
        #[arg(long, default_value_t = false, conflicts_with = "adaptive")]
        compare: bool,
    },
    /// Train regime weights and save the store.
    Train {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Weight store commands.
    Weights {
        #[command(subcommand)]
        action: WeightsAction,
    },
}

#[derive(Subcommand)]
enum WeightsAction {
    /// Print a saved weight store.
    Show {
        #[command(flatten)]
        common: CommonArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict { common, adaptive } => run_predict(&common, adaptive),
        Commands::Backtest {
            common,
            adaptive,
            compare,
        } => run_backtest(&common, adaptive, compare),
        Commands::Train { common } => run_train(&common),
        Commands::Weights { action } => match action {
            WeightsAction::Show { common } => run_weights_show(&common),
        },
    }
}

fn load_config(common: &CommonArgs) -> Result<RegimeLabConfig> {
    let mut config = match &common.config {
        Some(path) => RegimeLabConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RegimeLabConfig::default(),
    };
    if !common.symbols.is_empty() {
        config.data.symbols = common.symbols.clone();
    }
    if let Some(source) = common.source {
        config.data.source = source.into();
    }
    if let Some(store) = &common.store {
        config.weights.store_path = store.clone();
    }
    config.validate()?;
    if config.data.symbols.is_empty() {
        bail!("no symbols: pass --symbols or set data.symbols");
    }
    Ok(config)
}

fn mode_for(config: &RegimeLabConfig, adaptive: bool) -> WeightMode {
    if adaptive {
        WeightMode::Adaptive
    } else {
        config.weights.mode
    }
}

fn load_data(config: &RegimeLabConfig) -> Result<LoadedUniverse> {
    let provider = provider_for(&config.data)?;
    let window = config.fetch_window();
    info!(
        source = provider.name(),
        symbols = config.data.symbols.len(),
        interval = %config.data.interval,
        history_days = config.data.history_days,
        "loading data"
    );
    let universe = load_universe(&config.data.symbols, provider.as_ref(), &window);
    for failure in &universe.failures {
        eprintln!("Error for {}: {}", failure.symbol, failure.error);
    }
    if universe.is_empty() {
        bail!("no data loaded for any symbol");
    }
    Ok(universe)
}

fn write_output<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("Results saved to: {}", path.display());
    Ok(())
}

// ── predict ──────────────────────────────────────────────────────────

fn run_predict(common: &CommonArgs, adaptive: bool) -> Result<()> {
    let config = load_config(common)?;
    let predictor = predictor_for(&config, mode_for(&config, adaptive))?;
    let universe = load_data(&config)?;

    let mut signals: Vec<SignalReport> = Vec::new();
    for symbol in &universe.symbols {
        let Some(bars) = universe.bars.get(symbol) else {
            continue;
        };
        match predict_latest(symbol, bars, &predictor, &config) {
            Ok(signal) => signals.push(signal),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "prediction failed");
                eprintln!("Error for {symbol}: {e}");
            }
        }
    }

    for signal in &signals {
        print_signal(signal);
    }
    write_output(common.output.as_deref(), &signals)
}

fn print_signal(s: &SignalReport) {
    println!();
    println!("=== {} @ {} ===", s.symbol, s.timestamp);
    println!("Close:          {:.2}", s.close);
    println!(
        "Direction:      {} (score {:.3}, confidence {:.1}%)",
        s.direction, s.prediction.score, s.confidence
    );
    println!("Regime:         {} ({})", s.regime, s.bucket.name());
    println!("Weights:        {}", s.prediction.weight_source.describe());
    println!("Stop Loss:      {:.2}", s.levels.stop_loss);
    println!("Take Profit:    {:.2}", s.levels.take_profit);
    println!("Quantity:       {:.2}", s.quantity);
    if !s.actionable {
        println!("Below entry threshold; no trade.");
    }
    println!("--- Signals ---");
    for line in &s.prediction.signals {
        println!("  {line}");
    }
}

// ── backtest ─────────────────────────────────────────────────────────

fn run_backtest(common: &CommonArgs, adaptive: bool, compare: bool) -> Result<()> {
    let config = load_config(common)?;
    let backtester = Backtester::new(config.backtest_config());

    if compare {
        let static_predictor = predictor_for(&config, WeightMode::Static)?;
        let adaptive_predictor = predictor_for(&config, WeightMode::Adaptive)?;
        let universe = load_data(&config)?;
        let comparison =
            compare_weighting(&universe, &backtester, &static_predictor, &adaptive_predictor);
        print_comparison(&comparison);
        return write_output(common.output.as_deref(), &comparison);
    }

    let predictor = predictor_for(&config, mode_for(&config, adaptive))?;
    let universe = load_data(&config)?;
    let report = replay_universe(&universe, &backtester, &predictor);
    print_batch(&report);
    write_output(common.output.as_deref(), &report)
}

fn print_batch(report: &BatchReport) {
    println!();
    println!("=== Backtest ({} weights) ===", report.predictor);
    println!(
        "{:<8} {:>7} {:>9} {:>10} {:>9} {:>8} {:>9}",
        "Symbol", "Trades", "Win Rate", "Return", "Accuracy", "PF", "Max DD"
    );
    println!("{}", "-".repeat(66));
    for outcome in &report.outcomes {
        match outcome {
            TickerOutcome::Completed { report: r } => {
                let m = &r.metrics;
                println!(
                    "{:<8} {:>7} {:>8.1}% {:>9.2}% {:>8.1}% {:>8.2} {:>8.2}%",
                    r.symbol,
                    m.trade_count,
                    m.win_rate * 100.0,
                    m.total_return * 100.0,
                    m.prediction_accuracy * 100.0,
                    m.profit_factor,
                    m.max_drawdown * 100.0
                );
            }
            TickerOutcome::NoTrades {
                symbol,
                predictions,
            } => println!("{symbol:<8} no trades ({predictions} predictions)"),
            TickerOutcome::Failed { symbol, error } => println!("{symbol:<8} failed: {error}"),
        }
    }
    let s = &report.summary;
    println!();
    println!(
        "Completed {}/{} tickers, {} trades",
        s.completed, s.tickers, s.total_trades
    );
    println!("Avg Return:     {:.2}%", s.avg_total_return * 100.0);
    println!("Avg Win Rate:   {:.1}%", s.avg_win_rate * 100.0);
    println!("Avg Accuracy:   {:.1}%", s.avg_accuracy * 100.0);
    println!("Dataset:        {}", report.dataset_hash);
    println!("Run:            {}", report.run_fingerprint);
}

fn print_comparison(c: &WeightingComparison) {
    let pct = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0));

    println!();
    println!("=== Static vs Adaptive Weights ===");
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Symbol", "Acc (S)", "Acc (A)", "Ret (S)", "Ret (A)", "Acc Δ"
    );
    println!("{}", "-".repeat(63));
    for row in &c.rows {
        println!(
            "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10}",
            row.symbol,
            pct(row.static_weights.map(|m| m.accuracy)),
            pct(row.adaptive_weights.map(|m| m.accuracy)),
            pct(row.static_weights.map(|m| m.total_return)),
            pct(row.adaptive_weights.map(|m| m.total_return)),
            pct(row.accuracy_delta()),
        );
    }
    println!();
    println!("{:<16} {:>10} {:>10} {:>10}", "Average", "Static", "Adaptive", "Delta");
    let line = |name: &str, s: f64, a: f64| {
        println!(
            "{:<16} {:>9.2}% {:>9.2}% {:>+9.2}%",
            name,
            s * 100.0,
            a * 100.0,
            (a - s) * 100.0
        );
    };
    line("Accuracy", c.static_avg.accuracy, c.adaptive_avg.accuracy);
    line("Win Rate", c.static_avg.win_rate, c.adaptive_avg.win_rate);
    line("Total Return", c.static_avg.total_return, c.adaptive_avg.total_return);
    println!(
        "{:<16} {:>10.2} {:>10.2} {:>+10.2}",
        "Profit Factor",
        c.static_avg.profit_factor,
        c.adaptive_avg.profit_factor,
        c.adaptive_avg.profit_factor - c.static_avg.profit_factor
    );
    println!();
    println!("Verdict: {}", c.verdict.describe());
    println!("Dataset: {}", c.dataset_hash);
    println!("Run:     {}", c.run_fingerprint);
}

// ── train / weights ──────────────────────────────────────────────────

fn run_train(common: &CommonArgs) -> Result<()> {
    let config = load_config(common)?;
    let universe = load_data(&config)?;
    let store = train_from_config(&universe.bars, &config)?;
    print_store(&store);
    println!("Store saved to: {}", config.weights.store_path.display());
    write_output(common.output.as_deref(), &store)
}

fn run_weights_show(common: &CommonArgs) -> Result<()> {
    let config = match &common.config {
        Some(path) => RegimeLabConfig::from_file(path)?,
        None => RegimeLabConfig::default(),
    };
    let path = common
        .store
        .clone()
        .unwrap_or_else(|| config.weights.store_path.clone());
    let store = WeightStore::load(&path)
        .with_context(|| format!("loading weight store {}", path.display()))?;
    println!("Store: {}", path.display());
    print_store(&store);
    write_output(common.output.as_deref(), &store)
}

fn print_store(store: &WeightStore) {
    let Some(trained) = store.trained() else {
        println!("Weight store is untrained; adaptive weights fall back to defaults.");
        return;
    };
    println!();
    println!("Method:         {:?}", trained.method);
    println!("Samples:        {}", trained.sample_count);
    println!("Global best:    {}", trained.global_best);
    println!();

    let header: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
    println!(
        "{:<18} {:<22} {:>9} {:>8}  {}",
        "Bucket",
        "Combination",
        "Accuracy",
        "Samples",
        header.join("/")
    );
    println!("{}", "-".repeat(90));
    for (bucket, a) in &trained.assignments {
        let weights: Vec<String> = a
            .weights
            .as_array()
            .iter()
            .map(|w| format!("{w:.2}"))
            .collect();
        println!(
            "{:<18} {:<22} {:>8.1}% {:>8}  {}{}",
            bucket.name(),
            a.combination,
            a.accuracy * 100.0,
            a.samples,
            weights.join("/"),
            if a.fell_back { "  (global fallback)" } else { "" }
        );
    }

    println!();
    println!("--- Candidates ---");
    let mut results: Vec<_> = trained.results.iter().collect();
    results.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
    for r in results {
        println!("{:<22} {:>6.2}% ({} samples)", r.name, r.accuracy * 100.0, r.samples);
    }
}
