//! Side-by-side view of every family's artifact for one symbol.

use chrono::{DateTime, Utc};
use market_data::Symbol;
use serde::Serialize;
use tracing::warn;

use crate::{
    evaluation::HoldoutScore,
    registry::{ModelFamily, ModelRegistry},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyStatus {
    pub family: ModelFamily,
    pub available: bool,
    pub trained_at: Option<DateTime<Utc>>,
    pub holdout: Option<HoldoutScore>,
}

/// One entry per family, in [`ModelFamily::ALL`] order. Unreadable artifacts
/// are reported as unavailable.
pub fn compare(registry: &ModelRegistry, symbol: &Symbol) -> Vec<FamilyStatus> {
    ModelFamily::ALL
        .iter()
        .map(|&family| match registry.summary(symbol, family.primary_kind()) {
            Ok(summary) => FamilyStatus {
                family,
                available: true,
                trained_at: Some(summary.trained_at),
                holdout: summary.holdout,
            },
            Err(err) => {
                if registry.exists(symbol, family.primary_kind()) {
                    warn!(%symbol, %family, error = %err, "artifact present but unreadable");
                }
                FamilyStatus {
                    family,
                    available: false,
                    trained_at: None,
                    holdout: None,
                }
            }
        })
        .collect()
}

/// The available family with the lowest holdout RMSE.
pub fn best_by_rmse(statuses: &[FamilyStatus]) -> Option<&FamilyStatus> {
    statuses
        .iter()
        .filter(|s| s.available)
        .filter_map(|s| s.holdout.map(|h| (s, h.rmse)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(s, _)| s)
}
