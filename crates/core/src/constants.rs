//! Constants used throughout the vitals core crate.
//!
//! This module contains all path and filename constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default directory for vitals data when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "vitals_data";

/// Directory name for per-kind sample ledgers.
pub const SAMPLES_DIR_NAME: &str = "samples";

/// File extension for sample ledgers.
pub const LEDGER_EXTENSION: &str = "yaml";

/// Filename for the patient's health characteristics.
pub const PROFILE_FILENAME: &str = "profile.yaml";
