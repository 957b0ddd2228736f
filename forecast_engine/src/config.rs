//! Pipeline configuration: parsing, validation, and environment overrides.
//!
//! The TOML file has four tables, every key optional:
//!
//! ```toml
//! [paths]
//! price_history = "data/processed/nifty50_processed.csv"
//! technical = "data/processed/nifty50_technical.csv"
//! model_dir = "models"
//!
//! [short_horizon]   # days
//! lookback = 60
//! min_days = 5
//! max_days = 90
//!
//! [long_horizon]    # years
//! min_years = 1
//! max_years = 10
//! expose_bounds = true
//!
//! [training.sequence]
//! [training.trend]
//! [training.arima]
//! [training.forest]
//! ```
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`load_config_str`]
//! - Parse + validate from a file path: [`load_config_path`]
//! - CLI resolution (flag, then `NIFTY_FORECAST_CONFIG`, then defaults, then
//!   `NIFTY_FORECAST_MODEL_DIR`): [`resolve_config`]

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_path, get_env_var};
use tracing::debug;

use crate::models::{
    arima::ArimaParams,
    forest::ForestParams,
    lstm::LstmParams,
    trend::{SeasonalityMode, TrendParams},
};

pub const CONFIG_ENV: &str = "NIFTY_FORECAST_CONFIG";
pub const MODEL_DIR_ENV: &str = "NIFTY_FORECAST_MODEL_DIR";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ForecastConfig {
    pub paths: PathsCfg,
    pub short_horizon: ShortHorizonCfg,
    pub long_horizon: LongHorizonCfg,
    pub training: TrainingCfg,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PathsCfg {
    /// Cleaned `(Stock, Date, OHLCV)` table.
    pub price_history: PathBuf,
    /// Technical-feature table written by the indicator job.
    pub technical: PathBuf,
    /// Root of the artifact store.
    pub model_dir: PathBuf,
}

impl Default for PathsCfg {
    fn default() -> Self {
        Self {
            price_history: PathBuf::from("data/processed/nifty50_processed.csv"),
            technical: PathBuf::from("data/processed/nifty50_technical.csv"),
            model_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ShortHorizonCfg {
    /// Trailing closes fed to the sequence model at training time.
    pub lookback: usize,
    pub min_days: u32,
    pub max_days: u32,
}

impl Default for ShortHorizonCfg {
    fn default() -> Self {
        Self {
            lookback: 60,
            min_days: 5,
            max_days: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LongHorizonCfg {
    pub min_years: u32,
    pub max_years: u32,
    /// Whether long-horizon results carry the trend model's interval.
    pub expose_bounds: bool,
}

impl Default for LongHorizonCfg {
    fn default() -> Self {
        Self {
            min_years: 1,
            max_years: 10,
            expose_bounds: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TrainingCfg {
    pub sequence: SequenceTrainingCfg,
    pub trend: TrendTrainingCfg,
    pub arima: ArimaTrainingCfg,
    pub forest: ForestTrainingCfg,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SequenceTrainingCfg {
    /// Symbols with fewer closes are skipped.
    pub min_history: usize,
    pub hidden_units: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for SequenceTrainingCfg {
    fn default() -> Self {
        let p = LstmParams::default();
        Self {
            min_history: 200,
            hidden_units: p.hidden_units,
            epochs: p.epochs,
            batch_size: p.batch_size,
            learning_rate: p.learning_rate,
            seed: p.seed,
        }
    }
}

impl SequenceTrainingCfg {
    pub fn params(&self) -> LstmParams {
        LstmParams {
            hidden_units: self.hidden_units,
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TrendTrainingCfg {
    pub min_history: usize,
    pub n_changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub yearly_order: usize,
    pub seasonality_mode: SeasonalityMode,
    pub interval_width: f64,
}

impl Default for TrendTrainingCfg {
    fn default() -> Self {
        let p = TrendParams::default();
        Self {
            min_history: 300,
            n_changepoints: p.n_changepoints,
            changepoint_range: p.changepoint_range,
            changepoint_prior_scale: p.changepoint_prior_scale,
            seasonality_prior_scale: p.seasonality_prior_scale,
            yearly_order: p.yearly_order,
            seasonality_mode: p.mode,
            interval_width: p.interval_width,
        }
    }
}

impl TrendTrainingCfg {
    pub fn params(&self) -> TrendParams {
        TrendParams {
            n_changepoints: self.n_changepoints,
            changepoint_range: self.changepoint_range,
            changepoint_prior_scale: self.changepoint_prior_scale,
            seasonality_prior_scale: self.seasonality_prior_scale,
            yearly_order: self.yearly_order,
            mode: self.seasonality_mode,
            interval_width: self.interval_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ArimaTrainingCfg {
    pub min_history: usize,
    pub p: usize,
    pub max_d: usize,
    pub train_ratio: f64,
}

impl Default for ArimaTrainingCfg {
    fn default() -> Self {
        let p = ArimaParams::default();
        Self {
            min_history: 100,
            p: p.p,
            max_d: p.max_d,
            train_ratio: 0.8,
        }
    }
}

impl ArimaTrainingCfg {
    pub fn params(&self) -> ArimaParams {
        ArimaParams {
            p: self.p,
            max_d: self.max_d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ForestTrainingCfg {
    /// Minimum indicator rows (after warm-up) required to train.
    pub min_rows: usize,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub train_ratio: f64,
    pub seed: u64,
}

impl Default for ForestTrainingCfg {
    fn default() -> Self {
        let p = ForestParams::default();
        Self {
            min_rows: 200,
            n_estimators: p.n_estimators,
            max_depth: p.max_depth,
            min_samples_split: p.min_samples_split,
            train_ratio: 0.8,
            seed: p.seed,
        }
    }
}

impl ForestTrainingCfg {
    pub fn params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            seed: self.seed,
        }
    }
}

impl ForecastConfig {
    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.short_horizon;
        if s.lookback < 2 {
            bail!("short_horizon.lookback must be at least 2, got {}", s.lookback);
        }
        if s.min_days == 0 || s.min_days > s.max_days {
            bail!(
                "short_horizon day bounds must satisfy 1 <= min_days <= max_days, got {}..={}",
                s.min_days,
                s.max_days
            );
        }
        let l = &self.long_horizon;
        if l.min_years == 0 || l.min_years > l.max_years {
            bail!(
                "long_horizon year bounds must satisfy 1 <= min_years <= max_years, got {}..={}",
                l.min_years,
                l.max_years
            );
        }

        let t = &self.training;
        if t.sequence.min_history <= s.lookback {
            bail!(
                "training.sequence.min_history ({}) must exceed short_horizon.lookback ({})",
                t.sequence.min_history,
                s.lookback
            );
        }
        if t.sequence.hidden_units == 0 || t.sequence.epochs == 0 || t.sequence.batch_size == 0 {
            bail!("training.sequence hidden_units, epochs and batch_size must be positive");
        }
        if !(t.sequence.learning_rate > 0.0) {
            bail!("training.sequence.learning_rate must be positive");
        }
        if !(t.trend.interval_width > 0.0 && t.trend.interval_width < 1.0) {
            bail!("training.trend.interval_width must be in (0, 1)");
        }
        if !(t.trend.changepoint_range > 0.0 && t.trend.changepoint_range <= 1.0) {
            bail!("training.trend.changepoint_range must be in (0, 1]");
        }
        for (name, ratio) in [
            ("training.arima.train_ratio", t.arima.train_ratio),
            ("training.forest.train_ratio", t.forest.train_ratio),
        ] {
            if !(ratio > 0.0 && ratio < 1.0) {
                bail!("{name} must be in (0, 1), got {ratio}");
            }
        }
        if t.forest.n_estimators == 0 || t.forest.max_depth == 0 {
            bail!("training.forest n_estimators and max_depth must be positive");
        }
        Ok(())
    }
}

/// Parse + validate a configuration from a TOML string.
pub fn load_config_str(s: &str) -> anyhow::Result<ForecastConfig> {
    let cfg: ForecastConfig = toml::from_str(s).context("parsing forecast config TOML")?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse + validate a configuration file.
pub fn load_config_path(path: &Path) -> anyhow::Result<ForecastConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    load_config_str(&s).with_context(|| format!("loading config file {}", path.display()))
}

/// Configuration for the CLI: explicit file, else `NIFTY_FORECAST_CONFIG`,
/// else defaults; `NIFTY_FORECAST_MODEL_DIR` then overrides `paths.model_dir`.
pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<ForecastConfig> {
    let mut cfg = match explicit {
        Some(path) => load_config_path(path)?,
        None => match get_env_var(CONFIG_ENV) {
            Ok(path) => load_config_path(Path::new(path.trim()))?,
            Err(_) => ForecastConfig::default(),
        },
    };
    if let Some(dir) = get_env_path(MODEL_DIR_ENV) {
        debug!(model_dir = %dir.display(), "model directory overridden from environment");
        cfg.paths.model_dir = dir;
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = load_config_str("").unwrap();
        assert_eq!(cfg, ForecastConfig::default());
        assert_eq!(cfg.short_horizon.lookback, 60);
        assert_eq!((cfg.short_horizon.min_days, cfg.short_horizon.max_days), (5, 90));
        assert_eq!((cfg.long_horizon.min_years, cfg.long_horizon.max_years), (1, 10));
        assert_eq!(cfg.training.forest.params(), ForestParams::default());
        assert_eq!(cfg.training.trend.params(), TrendParams::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = load_config_str(
            r#"
[paths]
model_dir = "/srv/models"

[training.trend]
seasonality_mode = "additive"
"#,
        )
        .unwrap();
        assert_eq!(cfg.paths.model_dir, PathBuf::from("/srv/models"));
        assert_eq!(cfg.paths.price_history, PathsCfg::default().price_history);
        assert_eq!(cfg.training.trend.params().mode, SeasonalityMode::Additive);
        assert_eq!(cfg.training.trend.min_history, 300);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_config_str("[paths]\nmodel_directory = \"x\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("model_directory"));
    }

    #[test]
    fn inverted_bounds_fail_validation() {
        let err = load_config_str("[short_horizon]\nmin_days = 30\nmax_days = 10\n").unwrap_err();
        assert!(err.to_string().contains("min_days"));
        assert!(load_config_str("[training.forest]\ntrain_ratio = 1.0\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.toml");
        std::fs::write(&path, "[long_horizon]\nexpose_bounds = false\n").unwrap();
        let cfg = load_config_path(&path).unwrap();
        assert!(!cfg.long_horizon.expose_bounds);

        let missing = load_config_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(missing.to_string().contains("nope.toml"));
    }
}
