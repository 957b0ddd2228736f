use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use market_data::{Symbol, io::sink::temp_path_for};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info};

use super::models::{ArtifactHandle, ArtifactKind, ArtifactSummary, StoredArtifact};

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The expected artifact file does not exist.
    #[error("no trained {kind} for {symbol} (expected at {})", path.display())]
    NotFound {
        symbol: Symbol,
        kind: ArtifactKind,
        path: PathBuf,
    },

    #[error("I/O error on {} ({symbol})", path.display())]
    Io {
        symbol: Symbol,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid artifact.
    #[error("artifact {} for {symbol} could not be decoded", path.display())]
    Decode {
        symbol: Symbol,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact {} holds a {found}, expected a {expected}", path.display())]
    KindMismatch {
        symbol: Symbol,
        path: PathBuf,
        expected: ArtifactKind,
        found: ArtifactKind,
    },

    #[error("failed to encode {kind} for {symbol}")]
    Encode {
        symbol: Symbol,
        kind: ArtifactKind,
        #[source]
        source: serde_json::Error,
    },
}

impl RegistryError {
    pub fn symbol(&self) -> &Symbol {
        match self {
            RegistryError::NotFound { symbol, .. }
            | RegistryError::Io { symbol, .. }
            | RegistryError::Decode { symbol, .. }
            | RegistryError::KindMismatch { symbol, .. }
            | RegistryError::Encode { symbol, .. } => symbol,
        }
    }
}

/// Filesystem-backed artifact store rooted at the model directory.
///
/// Readers may run concurrently; at most one training job should write a
/// given `(symbol, kind)` at a time.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
}

impl ModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of `(symbol, kind)`, whether or not it exists.
    pub fn path_for(&self, symbol: &Symbol, kind: ArtifactKind) -> PathBuf {
        self.root
            .join(kind.family().dir_name())
            .join(kind.file_name(symbol.stem()))
    }

    pub fn exists(&self, symbol: &Symbol, kind: ArtifactKind) -> bool {
        self.path_for(symbol, kind).is_file()
    }

    /// Handle to an existing artifact, or [`RegistryError::NotFound`] naming
    /// the symbol and the path that was checked.
    pub fn resolve(&self, symbol: &Symbol, kind: ArtifactKind) -> Result<ArtifactHandle, RegistryError> {
        let path = self.path_for(symbol, kind);
        if !path.is_file() {
            return Err(RegistryError::NotFound {
                symbol: symbol.clone(),
                kind,
                path,
            });
        }
        Ok(ArtifactHandle {
            symbol: symbol.clone(),
            kind,
            path,
        })
    }

    /// Resolves and decodes an artifact, checking its recorded kind.
    pub fn load<M: DeserializeOwned>(
        &self,
        symbol: &Symbol,
        kind: ArtifactKind,
    ) -> Result<StoredArtifact<M>, RegistryError> {
        let handle = self.resolve(symbol, kind)?;
        let artifact: StoredArtifact<M> = handle.load()?;
        if artifact.kind != kind {
            return Err(RegistryError::KindMismatch {
                symbol: symbol.clone(),
                path: handle.path,
                expected: kind,
                found: artifact.kind,
            });
        }
        debug!(symbol = %symbol, kind = %kind, trained_at = %artifact.trained_at, "loaded artifact");
        Ok(artifact)
    }

    /// Envelope metadata (training time, holdout score) of an artifact.
    pub fn summary(&self, symbol: &Symbol, kind: ArtifactKind) -> Result<ArtifactSummary, RegistryError> {
        self.resolve(symbol, kind)?.load()
    }

    /// Atomically writes (or replaces) an artifact; returns its path.
    pub fn store<M: Serialize>(&self, artifact: &StoredArtifact<M>) -> Result<PathBuf, RegistryError> {
        let symbol = &artifact.symbol;
        let kind = artifact.kind;
        let path = self.path_for(symbol, kind);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| RegistryError::Io {
                symbol: symbol.clone(),
                path,
                source,
            }
        };

        let bytes = serde_json::to_vec(artifact).map_err(|source| RegistryError::Encode {
            symbol: symbol.clone(),
            kind,
            source,
        })?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        }
        let tmp = temp_path_for(&path);
        let written = fs::File::create(&tmp).and_then(|mut f| {
            f.write_all(&bytes)?;
            f.sync_all()
        });
        if let Err(source) = written {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(&tmp)(source));
        }
        fs::rename(&tmp, &path).map_err(io_err(&path))?;

        info!(symbol = %symbol, kind = %kind, path = %path.display(), bytes = bytes.len(), "stored artifact");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn keys_strip_market_suffix() {
        let reg = ModelRegistry::new("/models");
        let s = Symbol::new("RELIANCE.NS");
        assert_eq!(
            reg.path_for(&s, ArtifactKind::SequenceModel),
            PathBuf::from("/models/sequence/RELIANCE.json")
        );
        assert_eq!(
            reg.path_for(&s, ArtifactKind::SequenceScaler),
            PathBuf::from("/models/sequence/RELIANCE_scaler.json")
        );
        assert_eq!(
            reg.path_for(&s, ArtifactKind::TrendModel),
            PathBuf::from("/models/trend/RELIANCE.json")
        );
    }

    #[test]
    fn missing_artifact_names_symbol_and_path() {
        let dir = TempDir::new().unwrap();
        let reg = ModelRegistry::new(dir.path());
        let s = Symbol::new("UNKNOWNX.NS");
        let err = reg.resolve(&s, ArtifactKind::TrendModel).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("UNKNOWNX.NS"), "{msg}");
        assert!(msg.contains("UNKNOWNX.json"), "{msg}");
        assert!(matches!(err, RegistryError::NotFound { .. }));
        assert!(!reg.exists(&s, ArtifactKind::TrendModel));
    }

    #[test]
    fn store_then_resolve_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let reg = ModelRegistry::new(dir.path());
        let s = Symbol::new("TCS.NS");

        let first = StoredArtifact::new(s.clone(), ArtifactKind::ArimaModel, vec![1.0, 2.0]);
        let path = reg.store(&first).unwrap();
        assert!(reg.exists(&s, ArtifactKind::ArimaModel));
        assert!(!temp_path_for(&path).exists());

        let h1 = reg.resolve(&s, ArtifactKind::ArimaModel).unwrap();
        let h2 = reg.resolve(&s, ArtifactKind::ArimaModel).unwrap();
        assert_eq!(h1, h2);

        let second = StoredArtifact::new(s.clone(), ArtifactKind::ArimaModel, vec![3.0]);
        reg.store(&second).unwrap();
        let loaded: StoredArtifact<Vec<f64>> = reg.load(&s, ArtifactKind::ArimaModel).unwrap();
        assert_eq!(loaded.model, vec![3.0]);
        assert_eq!(loaded.symbol, s);
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let reg = ModelRegistry::new(dir.path());
        let s = Symbol::new("ITC.NS");
        let path = reg.path_for(&s, ArtifactKind::ForestModel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();
        let err = reg.load::<Vec<f64>>(&s, ArtifactKind::ForestModel).unwrap_err();
        assert!(matches!(err, RegistryError::Decode { .. }));
    }

    #[test]
    fn wrong_kind_in_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let reg = ModelRegistry::new(dir.path());
        let s = Symbol::new("INFY.NS");
        let a = StoredArtifact::new(s.clone(), ArtifactKind::ArimaModel, 1u8);
        let bytes = serde_json::to_vec(&a).unwrap();
        let path = reg.path_for(&s, ArtifactKind::TrendModel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        assert!(matches!(
            reg.load::<u8>(&s, ArtifactKind::TrendModel),
            Err(RegistryError::KindMismatch { .. })
        ));
    }
}
