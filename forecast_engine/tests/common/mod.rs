#![allow(dead_code)]

use chrono::NaiveDate;
use forecast_engine::{
    config::ForecastConfig,
    models::lstm::LstmParams,
    orchestrator::Orchestrator,
    registry::ModelRegistry,
    training::{SequenceTrainer, Trainer, TrendTrainer},
};
use market_data::{PriceBar, PriceSeries, PriceTable, Symbol, calendar};
use tempfile::TempDir;

pub struct TestRegistry {
    _dir: TempDir, // keep alive for the life of the test
    pub registry: ModelRegistry,
}

pub fn setup_registry() -> TestRegistry {
    let dir = TempDir::new().expect("tempdir");
    let registry = ModelRegistry::new(dir.path().join("models"));
    TestRegistry {
        _dir: dir,
        registry,
    }
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).expect("valid date")
}

/// `n` business-day bars of a drifting, oscillating price.
pub fn synthetic_series(symbol: &str, n: usize, base: f64) -> PriceSeries {
    let dates = calendar::business_days_after(start_date(), n);
    let bars = dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            let t = i as f64;
            let close = base * (1.0 + 0.0005 * t) + base * 0.03 * (t / 9.0).sin();
            PriceBar {
                date,
                open: close * 0.995,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000_000.0 + 1_000.0 * t,
            }
        })
        .collect();
    PriceSeries::new(Symbol::new(symbol), bars).expect("valid series")
}

/// A small, fast network with the production lookback.
pub fn quick_sequence_trainer() -> SequenceTrainer {
    let config = ForecastConfig::default();
    SequenceTrainer {
        params: LstmParams {
            hidden_units: 4,
            epochs: 2,
            ..LstmParams::default()
        },
        ..SequenceTrainer::from_config(&config)
    }
}

pub fn train_sequence(registry: &ModelRegistry, series: &PriceSeries) {
    quick_sequence_trainer()
        .train(registry, series.symbol(), series)
        .expect("sequence training");
}

pub fn train_trend(registry: &ModelRegistry, series: &PriceSeries) {
    TrendTrainer::from_config(&ForecastConfig::default())
        .train(registry, series.symbol(), series)
        .expect("trend training");
}

/// RELIANCE.NS with a sequence model and TCS.NS with a trend model.
pub fn setup_trained() -> (TestRegistry, Orchestrator) {
    let reg = setup_registry();
    let reliance = synthetic_series("RELIANCE.NS", 260, 2_500.0);
    let tcs = synthetic_series("TCS.NS", 400, 3_400.0);
    train_sequence(&reg.registry, &reliance);
    train_trend(&reg.registry, &tcs);

    let history: PriceTable = [reliance, tcs].into_iter().collect();
    let orchestrator = Orchestrator::new(reg.registry.clone(), history, &ForecastConfig::default());
    (reg, orchestrator)
}
