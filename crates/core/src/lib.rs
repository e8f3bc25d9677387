//! # Vitals Core
//!
//! Core business logic for importing and storing vital-sign samples.
//!
//! This crate contains pure data operations:
//! - Importing vitals from clinical documents ([`ClinicalDocumentImporter`])
//! - The [`VitalSampleSink`] contract and a file-backed [`SampleStore`]
//! - The health profile read model and body-mass-index computation
//!
//! **No presentation concerns**: argument parsing, output formatting and logging setup belong
//! in the `vitals` CLI and the `vitals-run` runner.

pub mod config;
pub mod constants;
pub mod error;
pub mod import;
pub mod profile;
pub mod sink;
pub mod store;

pub use config::CoreConfig;
pub use error::{VitalsError, VitalsResult};
pub use import::{ClinicalDocumentImporter, ImportOutcome, ImportReport};
pub use profile::{BiologicalSex, BloodType, Characteristics, HealthProfile, ProfileService};
pub use sink::{SaveOutcome, VitalSampleSink};
pub use store::SampleStore;

pub use vitals_types::{Unit, VitalKind, VitalSample};
