//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Core services never read process-wide environment variables
//! themselves; binaries resolve them and hand the result over as a [`CoreConfig`].

use crate::constants::{DEFAULT_DATA_DIR, PROFILE_FILENAME, SAMPLES_DIR_NAME};
use crate::{VitalsError, VitalsResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`VitalsError::InvalidInput`] if `data_dir` is empty or names an existing
    /// non-directory.
    pub fn new(data_dir: PathBuf) -> VitalsResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(VitalsError::InvalidInput("data_dir cannot be empty".into()));
        }

        if data_dir.exists() && !data_dir.is_dir() {
            return Err(VitalsError::InvalidInput(format!(
                "data_dir {} exists but is not a directory",
                data_dir.display()
            )));
        }

        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn samples_dir(&self) -> PathBuf {
        self.data_dir.join(SAMPLES_DIR_NAME)
    }

    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join(PROFILE_FILENAME)
    }
}

/// Resolve the data directory from an optional override value.
///
/// `None`, empty or whitespace-only values fall back to [`DEFAULT_DATA_DIR`] relative to the
/// current working directory.
pub fn resolve_data_dir(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}
