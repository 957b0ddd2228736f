//! Trained-artifact store keyed by `(symbol, kind)`.
//!
//! Every artifact lives at a path derived only from the model directory, the
//! artifact kind and the symbol with its market suffix stripped:
//!
//! ```text
//! <model_dir>/sequence/RELIANCE.json
//! <model_dir>/sequence/RELIANCE_scaler.json
//! <model_dir>/trend/TCS.json
//! <model_dir>/arima/INFY.json
//! <model_dir>/forest/ITC.json
//! ```
//!
//! Writes go to a temporary sibling and are renamed into place, so a reader
//! sees either the previous artifact or the new one, never a partial file.
//! Retraining replaces an artifact wholesale; there is no versioning.

pub mod models;
pub mod store;

pub use models::{ArtifactHandle, ArtifactKind, ArtifactSummary, ModelFamily, StoredArtifact};
pub use store::{ModelRegistry, RegistryError};
