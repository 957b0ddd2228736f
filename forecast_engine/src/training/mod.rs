//! Batch training: one trainer per model family, run sequentially over
//! symbols, with a per-symbol outcome and a summary.
//!
//! A symbol whose primary artifact already exists is skipped unless
//! [`BatchOptions::force`] is set. One symbol failing never aborts the batch.

use std::{fmt, path::PathBuf, sync::Arc};

use indexmap::IndexMap;
use market_data::Symbol;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    evaluation::HoldoutScore,
    models::ModelError,
    registry::{ModelFamily, ModelRegistry, RegistryError},
};

pub mod arima;
pub mod forest;
pub mod sequence;
pub mod trend;

pub use arima::ArimaTrainer;
pub use forest::ForestTrainer;
pub use sequence::SequenceTrainer;
pub use trend::TrendTrainer;

/// Why a symbol was not trained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyTrained,
    InsufficientData { required: usize, actual: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyTrained => f.write_str("already trained"),
            SkipReason::InsufficientData { required, actual } => {
                write!(f, "insufficient data ({actual} < {required})")
            }
        }
    }
}

/// Result of training one symbol.
#[derive(Debug, Clone)]
pub enum TrainOutcome {
    Trained {
        path: PathBuf,
        holdout: Option<HoldoutScore>,
    },
    Skipped(SkipReason),
    /// The error that stopped training, shared so summaries stay `Clone`.
    Failed(Arc<TrainError>),
}

/// What a successful [`Trainer::train`] stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Trained {
    /// Path of the family's primary artifact.
    pub path: PathBuf,
    pub holdout: Option<HoldoutScore>,
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl TrainError {
    /// Data shortfalls are skips, everything else is a failure.
    fn into_outcome(self) -> TrainOutcome {
        match self {
            TrainError::InsufficientData { required, actual }
            | TrainError::Model(ModelError::InsufficientData { required, actual }) => {
                TrainOutcome::Skipped(SkipReason::InsufficientData { required, actual })
            }
            other => TrainOutcome::Failed(Arc::new(other)),
        }
    }
}

/// Fits and stores one family's artifacts for a single symbol.
pub trait Trainer {
    /// Per-symbol training data.
    type Input: ?Sized;

    fn family(&self) -> ModelFamily;

    fn train(
        &self,
        registry: &ModelRegistry,
        symbol: &Symbol,
        input: &Self::Input,
    ) -> Result<Trained, TrainError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Retrain symbols that already have an artifact.
    pub force: bool,
}

/// Per-symbol outcomes of one batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    family: ModelFamily,
    outcomes: IndexMap<Symbol, TrainOutcome>,
}

impl BatchSummary {
    pub fn new(family: ModelFamily) -> Self {
        Self {
            family,
            outcomes: IndexMap::new(),
        }
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn record(&mut self, symbol: Symbol, outcome: TrainOutcome) {
        self.outcomes.insert(symbol, outcome);
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&TrainOutcome> {
        self.outcomes.get(symbol)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&Symbol, &TrainOutcome)> {
        self.outcomes.iter()
    }

    pub fn trained(&self) -> usize {
        self.count(|o| matches!(o, TrainOutcome::Trained { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TrainOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TrainOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&TrainOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SUMMARY family={} trained={} skipped={} failed={}",
            self.family,
            self.trained(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Trains every `(symbol, input)` pair in order.
pub fn run_batch<'a, T, I>(
    trainer: &T,
    registry: &ModelRegistry,
    inputs: I,
    options: BatchOptions,
) -> BatchSummary
where
    T: Trainer,
    T::Input: 'a,
    I: IntoIterator<Item = (&'a Symbol, &'a T::Input)>,
{
    let family = trainer.family();
    let mut summary = BatchSummary::new(family);

    for (symbol, input) in inputs {
        let outcome = if !options.force && registry.exists(symbol, family.primary_kind()) {
            TrainOutcome::Skipped(SkipReason::AlreadyTrained)
        } else {
            match trainer.train(registry, symbol, input) {
                Ok(Trained { path, holdout }) => TrainOutcome::Trained { path, holdout },
                Err(err) => err.into_outcome(),
            }
        };

        match &outcome {
            TrainOutcome::Trained { path, holdout } => info!(
                %family,
                %symbol,
                path = %path.display(),
                rmse = holdout.map(|h| h.rmse),
                "trained"
            ),
            TrainOutcome::Skipped(reason) => info!(%family, %symbol, %reason, "skipped"),
            TrainOutcome::Failed(cause) => warn!(%family, %symbol, %cause, "training failed"),
        }
        summary.record(symbol.clone(), outcome);
    }

    info!("{summary}");
    summary
}
