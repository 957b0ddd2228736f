use std::path::PathBuf;

use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values are treated as missing so that `VAR=` in a shell or `.env`
/// file behaves like an unset variable.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}

/// Reads an optional environment variable holding a filesystem path.
///
/// Returns `None` when the variable is unset or blank.
pub fn get_env_path(name: &str) -> Option<PathBuf> {
    get_env_var(name).ok().map(|v| PathBuf::from(v.trim()))
}
