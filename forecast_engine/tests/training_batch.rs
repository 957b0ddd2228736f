mod common;

use forecast_engine::{
    comparison::compare,
    config::ForecastConfig,
    indicators::compute_indicators,
    models::forest::ForestParams,
    registry::{ArtifactKind, ModelFamily},
    training::{ArimaTrainer, BatchOptions, ForestTrainer, SkipReason, TrainOutcome, run_batch},
};
use market_data::{PriceTable, Symbol};

use common::{quick_sequence_trainer, setup_registry, synthetic_series};

#[test]
fn sequence_batch_trains_skips_and_summarizes() {
    let reg = setup_registry();
    let table: PriceTable = [
        synthetic_series("HDFCBANK.NS", 230, 1_600.0),
        synthetic_series("NEWLIST.NS", 120, 300.0),
    ]
    .into_iter()
    .collect();
    let inputs = || table.iter().map(|s| (s.symbol(), s));
    let trainer = quick_sequence_trainer();

    let summary = run_batch(&trainer, &reg.registry, inputs(), BatchOptions::default());
    assert_eq!(summary.family(), ModelFamily::Sequence);
    assert_eq!((summary.trained(), summary.skipped(), summary.failed()), (1, 1, 0));
    assert!(matches!(
        summary.get(&Symbol::new("NEWLIST.NS")),
        Some(TrainOutcome::Skipped(SkipReason::InsufficientData {
            required: 200,
            actual: 120
        }))
    ));

    let hdfc = Symbol::new("HDFCBANK.NS");
    assert!(reg.registry.exists(&hdfc, ArtifactKind::SequenceModel));
    assert!(reg.registry.exists(&hdfc, ArtifactKind::SequenceScaler));

    let rerun = run_batch(&trainer, &reg.registry, inputs(), BatchOptions::default());
    assert!(matches!(
        rerun.get(&hdfc),
        Some(TrainOutcome::Skipped(SkipReason::AlreadyTrained))
    ));
    assert_eq!(
        rerun.to_string(),
        "SUMMARY family=sequence trained=0 skipped=2 failed=0"
    );
}

#[test]
fn holdout_families_record_scores_for_comparison() {
    let reg = setup_registry();
    let config = ForecastConfig::default();
    let series = synthetic_series("SBIN.NS", 320, 600.0);
    let symbol = series.symbol().clone();

    let arima = run_batch(
        &ArimaTrainer::from_config(&config),
        &reg.registry,
        [(&symbol, &series)],
        BatchOptions::default(),
    );
    match arima.get(&symbol) {
        Some(TrainOutcome::Trained { holdout: Some(score), .. }) => {
            assert!(score.rmse.is_finite() && score.rmse >= 0.0);
            assert!(score.observations > 0);
        }
        other => panic!("unexpected arima outcome: {other:?}"),
    }

    let rows = compute_indicators(&series);
    let forest_trainer = ForestTrainer {
        params: ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        },
        ..ForestTrainer::from_config(&config)
    };
    let forest = run_batch(
        &forest_trainer,
        &reg.registry,
        [(&symbol, rows.as_slice())],
        BatchOptions::default(),
    );
    assert_eq!(forest.trained(), 1, "{forest}");

    let statuses = compare(&reg.registry, &symbol);
    let scored: Vec<ModelFamily> = statuses
        .iter()
        .filter(|s| s.available && s.holdout.is_some())
        .map(|s| s.family)
        .collect();
    assert_eq!(scored, [ModelFamily::Arima, ModelFamily::Forest]);
}
