//! Vital-sign extraction from CDA documents.
//!
//! Responsibilities:
//! - Locate the vital signs section and its observation entries
//! - Decode each observation's effective date and quantity
//! - Classify an observation into zero or more [`VitalKind`]s by description keywords
//!
//! Notes:
//! - Classification is substring matching over the serialised observation, and is not
//!   exclusive: an observation mentioning both "weight" and "height" yields two vitals.
//! - Decoding failures are reported per entry so one bad observation never aborts a document.

use crate::document::{Document, Element};
use crate::path::{NamespaceContext, Path};
use crate::{
    CdaResult, EntryError, ROOT_ELEMENT_NAME, VITAL_SIGNS_SECTION_TEMPLATE_ID,
    VITAL_SIGN_OBSERVATION_TEMPLATE_ID,
};
use chrono::NaiveDate;
use vitals_types::{VitalKind, VitalSample};

const SECTION_PATH: &str =
    "/cda:ClinicalDocument/cda:component/cda:structuredBody/cda:component/cda:section";

/// Description keywords and the vital kind each one selects, in the order they are checked.
const KEYWORDS: [(&str, VitalKind); 5] = [
    ("weight", VitalKind::BodyMass),
    ("bmi", VitalKind::BodyMassIndex),
    ("height", VitalKind::Height),
    ("temperature", VitalKind::BodyTemperature),
    ("heart rate", VitalKind::HeartRate),
];

/// Result of looking for vitals in a parsed document.
#[derive(Debug)]
pub enum VitalsLookup<'d> {
    /// The root element is not `ClinicalDocument`.
    NotClinicalDocument,
    /// The document has no vital signs section.
    NoVitalsSection,
    /// Observation entries found under the document's sections, in document order.
    Observations(Vec<&'d Element>),
}

/// Decoded contents of one vital-sign observation.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryVitals {
    pub date: NaiveDate,
    pub value: f64,
    pub kinds: Vec<VitalKind>,
}

impl EntryVitals {
    /// One sample per recognised kind, each in that kind's import unit.
    pub fn samples(&self) -> impl Iterator<Item = VitalSample> + '_ {
        self.kinds
            .iter()
            .map(|kind| VitalSample::imported(*kind, self.value, self.date))
    }
}

/// Find the observation entries of a document's vital signs section.
///
/// The vitals section is detected by its template id; observations are then collected from
/// `section/entry/organizer/component/observation` across the structured body.
///
/// # Errors
///
/// Only fails if the built-in path expressions cannot be evaluated, which indicates a bug
/// rather than bad input.
pub fn locate_vitals(document: &Document) -> CdaResult<VitalsLookup<'_>> {
    if document.root().local_name() != ROOT_ELEMENT_NAME {
        return Ok(VitalsLookup::NotClinicalDocument);
    }

    let namespaces = NamespaceContext::cda();

    let section_marker = Path::parse(&format!(
        "{SECTION_PATH}/cda:templateId[@root='{VITAL_SIGNS_SECTION_TEMPLATE_ID}']"
    ))?;
    if !section_marker.exists(document, &namespaces)? {
        return Ok(VitalsLookup::NoVitalsSection);
    }

    let observations = Path::parse(&format!(
        "{SECTION_PATH}/cda:entry/cda:organizer/cda:component/cda:observation"
    ))?;
    Ok(VitalsLookup::Observations(
        observations.select(document, &namespaces)?,
    ))
}

/// Decode one observation entry.
///
/// Returns `Ok(None)` when the observation is not a vital-sign observation. A vital-sign
/// observation whose description matches no keyword decodes to an [`EntryVitals`] with no
/// kinds.
///
/// # Errors
///
/// Returns [`EntryError`] if the effective time or value is missing or malformed.
pub fn read_entry(observation: &Element) -> Result<Option<EntryVitals>, EntryError> {
    let description = observation.describe();
    if !description.contains(VITAL_SIGN_OBSERVATION_TEMPLATE_ID) {
        return Ok(None);
    }

    let raw_date = observation
        .first_child("effectiveTime")
        .and_then(|e| e.attribute("value"))
        .ok_or(EntryError::MissingEffectiveTime)?;
    let date = parse_effective_date(raw_date)?;

    let raw_value = observation
        .first_child("value")
        .and_then(|e| e.attribute("value"))
        .ok_or(EntryError::MissingValue)?;
    let value = parse_quantity(raw_value)?;

    Ok(Some(EntryVitals {
        date,
        value,
        kinds: classify(&description),
    }))
}

/// Kinds whose keyword appears in `description`, in keyword order.
///
/// Matching is case-sensitive and every keyword is checked.
pub fn classify(description: &str) -> Vec<VitalKind> {
    KEYWORDS
        .iter()
        .filter(|(keyword, _)| description.contains(keyword))
        .map(|(_, kind)| *kind)
        .collect()
}

/// Decode a CDA timestamp into a calendar date.
///
/// Only the leading eight characters are used, read positionally as `YYYYMMDD`; any time or
/// offset that follows is ignored.
///
/// # Errors
///
/// Returns [`EntryError::InvalidDate`] if there are fewer than eight leading characters, they
/// are not all digits, or they do not name a real date.
pub fn parse_effective_date(raw: &str) -> Result<NaiveDate, EntryError> {
    let invalid = || EntryError::InvalidDate(raw.to_string());

    let digits = raw
        .get(..8)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(invalid)?;

    let year: i32 = digits[0..4].parse().map_err(|_| invalid())?;
    let month: u32 = digits[4..6].parse().map_err(|_| invalid())?;
    let day: u32 = digits[6..8].parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parse an observation quantity.
///
/// # Errors
///
/// Returns [`EntryError::InvalidValue`] unless the text is a finite decimal number.
pub fn parse_quantity(raw: &str) -> Result<f64, EntryError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EntryError::InvalidValue(raw.to_string()))
}
