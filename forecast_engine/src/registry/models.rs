use std::{fmt, fs, path::{Path, PathBuf}};

use chrono::{DateTime, Utc};
use market_data::Symbol;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::store::RegistryError;
use crate::evaluation::HoldoutScore;

/// A forecasting model family; one artifact set per symbol per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Sequence,
    Trend,
    Arima,
    Forest,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::Sequence,
        ModelFamily::Trend,
        ModelFamily::Arima,
        ModelFamily::Forest,
    ];

    /// Directory under the model root holding this family's artifacts.
    pub fn dir_name(self) -> &'static str {
        match self {
            ModelFamily::Sequence => "sequence",
            ModelFamily::Trend => "trend",
            ModelFamily::Arima => "arima",
            ModelFamily::Forest => "forest",
        }
    }

    /// The artifact whose presence marks the family as trained for a symbol.
    ///
    /// For the sequence family this is the network, which is written after
    /// its scaler.
    pub fn primary_kind(self) -> ArtifactKind {
        match self {
            ModelFamily::Sequence => ArtifactKind::SequenceModel,
            ModelFamily::Trend => ArtifactKind::TrendModel,
            ModelFamily::Arima => ArtifactKind::ArimaModel,
            ModelFamily::Forest => ArtifactKind::ForestModel,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// What a stored artifact contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    SequenceModel,
    SequenceScaler,
    TrendModel,
    ArimaModel,
    ForestModel,
}

impl ArtifactKind {
    pub fn family(self) -> ModelFamily {
        match self {
            ArtifactKind::SequenceModel | ArtifactKind::SequenceScaler => ModelFamily::Sequence,
            ArtifactKind::TrendModel => ModelFamily::Trend,
            ArtifactKind::ArimaModel => ModelFamily::Arima,
            ArtifactKind::ForestModel => ModelFamily::Forest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::SequenceModel => "sequence_model",
            ArtifactKind::SequenceScaler => "sequence_scaler",
            ArtifactKind::TrendModel => "trend_model",
            ArtifactKind::ArimaModel => "arima_model",
            ArtifactKind::ForestModel => "forest_model",
        }
    }

    pub(crate) fn file_name(self, stem: &str) -> String {
        match self {
            ArtifactKind::SequenceScaler => format!("{stem}_scaler.json"),
            _ => format!("{stem}.json"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The on-disk envelope around a model's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArtifact<M> {
    pub symbol: Symbol,
    pub kind: ArtifactKind,
    pub trained_at: DateTime<Utc>,
    pub holdout: Option<HoldoutScore>,
    pub model: M,
}

impl<M> StoredArtifact<M> {
    /// Wraps freshly trained state, stamped with the current time.
    pub fn new(symbol: Symbol, kind: ArtifactKind, model: M) -> Self {
        Self {
            symbol,
            kind,
            trained_at: Utc::now(),
            holdout: None,
            model,
        }
    }

    pub fn with_holdout(mut self, holdout: Option<HoldoutScore>) -> Self {
        self.holdout = holdout;
        self
    }
}

/// Envelope metadata without the model payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtifactSummary {
    pub symbol: Symbol,
    pub kind: ArtifactKind,
    pub trained_at: DateTime<Utc>,
    pub holdout: Option<HoldoutScore>,
}

/// A resolved, existing artifact. Borrowed for one load; never written through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub(super) symbol: Symbol,
    pub(super) kind: ArtifactKind,
    pub(super) path: PathBuf,
}

impl ArtifactHandle {
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the artifact.
    pub fn load<T: DeserializeOwned>(&self) -> Result<T, RegistryError> {
        let bytes = fs::read(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                // removed between resolve and load
                RegistryError::NotFound {
                    symbol: self.symbol.clone(),
                    kind: self.kind,
                    path: self.path.clone(),
                }
            } else {
                RegistryError::Io {
                    symbol: self.symbol.clone(),
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|source| RegistryError::Decode {
            symbol: self.symbol.clone(),
            path: self.path.clone(),
            source,
        })
    }
}
