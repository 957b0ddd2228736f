use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use forecast_engine::{
    analysis::{filter_range, snapshot},
    comparison::{best_by_rmse, compare},
    config::{ForecastConfig, resolve_config},
    indicators::{compute_all, read_technical_table, write_technical_table},
    orchestrator::{ForecastMode, ForecastRequest, Orchestrator},
    registry::{ModelFamily, ModelRegistry},
    training::{
        ArimaTrainer, BatchOptions, BatchSummary, ForestTrainer, SequenceTrainer, TrendTrainer,
        forest::group_by_symbol, run_batch,
    },
};
use market_data::{
    PriceTable, Symbol,
    io::prices::{load_price_table, write_price_table},
    models::symbol::MARKET_SUFFIX,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(version, about = "NIFTY-50 price forecasting")]
struct Cli {
    /// Path to the config file (nifty_forecast.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Clean a raw price-history CSV into the processed table
    Preprocess {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
        /// Defaults to `paths.price_history`
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Compute the technical-feature table from the processed prices
    Indicators,

    /// Train one model family for every (or the selected) symbol
    Train(TrainCmd),

    /// Forecast one symbol
    Forecast {
        #[arg(long)]
        symbol: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Short)]
        mode: ModeArg,
        /// Business days (short) or years (long)
        #[arg(long)]
        horizon: u32,
        #[arg(long)]
        json: bool,
    },

    /// Trend and momentum signals over a date range
    Analyze {
        #[arg(long)]
        symbol: String,
        /// YYYY-MM-DD
        #[arg(long)]
        from: NaiveDate,
        /// YYYY-MM-DD
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        json: bool,
    },

    /// Artifact availability and holdout scores across families
    Compare {
        #[arg(long)]
        symbol: String,
    },
}

#[derive(Args)]
struct TrainCmd {
    #[arg(value_enum)]
    family: FamilyArg,
    /// Restrict to these symbols (repeatable)
    #[arg(long = "symbol")]
    symbols: Vec<String>,
    /// Retrain symbols that already have an artifact
    #[arg(long)]
    force: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Short,
    Long,
}

#[derive(Clone, Copy, ValueEnum)]
enum FamilyArg {
    Sequence,
    Trend,
    Arima,
    Forest,
}

impl From<ModeArg> for ForecastMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Short => ForecastMode::Short,
            ModeArg::Long => ForecastMode::Long,
        }
    }
}

impl From<FamilyArg> for ModelFamily {
    fn from(family: FamilyArg) -> Self {
        match family {
            FamilyArg::Sequence => ModelFamily::Sequence,
            FamilyArg::Trend => ModelFamily::Trend,
            FamilyArg::Arima => ModelFamily::Arima,
            FamilyArg::Forest => ModelFamily::Forest,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref())?;

    match cli.cmd {
        Cmd::Preprocess { input, output } => {
            let output = output.unwrap_or_else(|| config.paths.price_history.clone());
            let (table, report) = load_price_table(&input)
                .with_context(|| format!("loading raw prices from {}", input.display()))?;
            let written = write_price_table(&output, &table)?;
            info!(?report, written, output = %output.display(), "preprocessed price history");
        }
        Cmd::Indicators => {
            let table = load_history(&config)?;
            let rows = compute_all(&table);
            let written = write_technical_table(&config.paths.technical, &rows)?;
            info!(written, output = %config.paths.technical.display(), "wrote technical table");
        }
        Cmd::Train(cmd) => {
            let summary = train(&config, &cmd)?;
            println!("{summary}");
            if summary.trained() == 0 && summary.failed() > 0 {
                bail!("every {} training attempt failed", summary.family());
            }
        }
        Cmd::Forecast {
            symbol,
            mode,
            horizon,
            json,
        } => {
            let orchestrator = Orchestrator::new(registry(&config), load_history(&config)?, &config);
            let request = ForecastRequest {
                symbol: parse_symbol(&symbol),
                mode: mode.into(),
                horizon,
            };
            let result = orchestrator.forecast(&request)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{} {} forecast ({} rows)", result.symbol, result.mode, result.points.len());
                for p in &result.points {
                    match (p.lower_bound, p.upper_bound) {
                        (Some(lo), Some(hi)) => {
                            println!("{}  {:>10.2}  [{:.2}, {:.2}]", p.date, p.predicted_price, lo, hi)
                        }
                        _ => println!("{}  {:>10.2}", p.date, p.predicted_price),
                    }
                }
            }
        }
        Cmd::Analyze {
            symbol,
            from,
            to,
            json,
        } => {
            let symbol = parse_symbol(&symbol);
            let rows = read_technical_table(&config.paths.technical)?;
            let window = filter_range(&rows, &symbol, from, to)?;
            let Some(snap) = snapshot(&window) else {
                bail!("no data for {symbol}");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&snap)?);
            } else {
                println!("{} {}..={} ({} rows)", snap.symbol, snap.from, snap.to, snap.rows);
                println!("close      {:.2} ({:+.2}% over window)", snap.close, snap.change_pct);
                println!("range      {:.2} - {:.2}", snap.period_low, snap.period_high);
                println!("SMA 20/50  {:.2} / {:.2}", snap.sma_20, snap.sma_50);
                println!("RSI 14     {:.2} ({})", snap.rsi_14, snap.momentum);
                println!("volatility {:.4}", snap.volatility_20);
                println!("trend      {}", snap.trend);
            }
        }
        Cmd::Compare { symbol } => {
            let symbol = parse_symbol(&symbol);
            let statuses = compare(&registry(&config), &symbol);
            for s in &statuses {
                match (s.available, s.holdout) {
                    (false, _) => println!("{:<8} not trained", s.family),
                    (true, Some(h)) => println!(
                        "{:<8} rmse={:.4} mae={:.4} mape={}",
                        s.family,
                        h.rmse,
                        h.mae,
                        h.mape.map_or_else(|| "n/a".to_string(), |m| format!("{m:.2}%"))
                    ),
                    (true, None) => println!("{:<8} trained (no holdout score)", s.family),
                }
            }
            if let Some(best) = best_by_rmse(&statuses) {
                println!("best by holdout rmse: {}", best.family);
            }
        }
    }

    Ok(())
}

fn registry(config: &ForecastConfig) -> ModelRegistry {
    ModelRegistry::new(&config.paths.model_dir)
}

fn load_history(config: &ForecastConfig) -> Result<PriceTable> {
    let path = &config.paths.price_history;
    let (table, _) = load_price_table(path)
        .with_context(|| format!("loading price history from {}", path.display()))?;
    Ok(table)
}

/// Accepts `RELIANCE` as well as `RELIANCE.NS`.
fn parse_symbol(raw: &str) -> Symbol {
    let raw = raw.trim();
    if raw.contains('.') {
        Symbol::new(raw)
    } else {
        Symbol::new(format!("{raw}{MARKET_SUFFIX}"))
    }
}

fn train(config: &ForecastConfig, cmd: &TrainCmd) -> Result<BatchSummary> {
    let registry = registry(config);
    let options = BatchOptions { force: cmd.force };
    let wanted: Vec<Symbol> = cmd.symbols.iter().map(|s| parse_symbol(s)).collect();
    let selected = |s: &Symbol| wanted.is_empty() || wanted.contains(s);

    let summary = match ModelFamily::from(cmd.family) {
        ModelFamily::Forest => {
            let grouped = group_by_symbol(read_technical_table(&config.paths.technical)?);
            let inputs = grouped
                .iter()
                .filter(|&(s, _)| selected(s))
                .map(|(s, rows)| (s, rows.as_slice()));
            run_batch(&ForestTrainer::from_config(config), &registry, inputs, options)
        }
        family => {
            let table = load_history(config)?;
            let inputs = table.iter().filter(|s| selected(s.symbol())).map(|s| (s.symbol(), s));
            match family {
                ModelFamily::Sequence => {
                    run_batch(&SequenceTrainer::from_config(config), &registry, inputs, options)
                }
                ModelFamily::Trend => {
                    run_batch(&TrendTrainer::from_config(config), &registry, inputs, options)
                }
                _ => run_batch(&ArimaTrainer::from_config(config), &registry, inputs, options),
            }
        }
    };
    Ok(summary)
}
