//! CDA (Clinical Document Architecture) boundary support.
//!
//! This crate translates clinical-document XML into vital-sign samples:
//! - an owned, namespace-aware element tree ([`Document`])
//! - location-path queries evaluated against an explicit [`NamespaceContext`]
//! - decoding of vital-sign observation entries into [`VitalSample`]s
//!
//! It performs no storage. Recognised vitals are handed back to the caller, which owns the
//! decision of where they go (see `vitals_core::ClinicalDocumentImporter`).

pub mod document;
pub mod path;
pub mod vitals;

pub use document::{Attribute, Document, Element, MAX_NESTING_DEPTH};
pub use path::{NamespaceContext, Path};
pub use vitals::{
    classify, locate_vitals, parse_effective_date, parse_quantity, read_entry, EntryVitals,
    VitalsLookup,
};

pub use vitals_types::{Unit, VitalKind, VitalSample};

/// HL7 v3 namespace used by CDA documents.
pub const CDA_NAMESPACE: &str = "urn:hl7-org:v3";

/// Prefix bound to [`CDA_NAMESPACE`] in path queries.
pub const CDA_PREFIX: &str = "cda";

/// Local name of a CDA document's root element.
pub const ROOT_ELEMENT_NAME: &str = "ClinicalDocument";

/// Template id of the vital signs section (entries required).
pub const VITAL_SIGNS_SECTION_TEMPLATE_ID: &str = "2.16.840.1.113883.10.20.22.2.4";

/// Template id of a vital sign observation.
pub const VITAL_SIGN_OBSERVATION_TEMPLATE_ID: &str = "2.16.840.1.113883.10.20.22.4.27";

/// Errors returned by the `cda` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum CdaError {
    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("invalid path expression '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("namespace prefix '{0}' is not bound in the query context")]
    UnboundPrefix(String),
}

/// Type alias for Results that can fail with a [`CdaError`].
pub type CdaResult<T> = Result<T, CdaError>;

/// Reasons a single observation entry cannot be turned into samples.
///
/// These are per-entry failures: callers skip the entry and carry on with the rest of the
/// document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("observation has no effectiveTime value")]
    MissingEffectiveTime,

    #[error("effectiveTime '{0}' is not a YYYYMMDD date")]
    InvalidDate(String),

    #[error("observation has no value")]
    MissingValue,

    #[error("observation value '{0}' is not a finite number")]
    InvalidValue(String),
}
