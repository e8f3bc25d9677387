//! Clinical-document vitals import.
//!
//! Parses a CDA document, walks the observation entries of its vital signs section and hands
//! every recognised vital to a [`VitalSampleSink`] as soon as it is decoded.
//!
//! Failure containment:
//! - XML that is not well-formed is an error returned to the caller
//! - a document that is not a `ClinicalDocument`, or has no vitals section, imports nothing
//! - a malformed observation is skipped; the rest of the document is still imported
//! - a sink failure is logged and counted; the sample is not retried

use crate::sink::{SaveOutcome, VitalSampleSink};
use crate::VitalsResult;
use cda::{Document, VitalsLookup};

/// How far an import got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The root element is not `ClinicalDocument`; nothing was imported.
    NotClinicalDocument,
    /// The document has no vital signs section; nothing was imported.
    NoVitalsSection,
    /// The vital signs section was processed.
    Imported,
}

/// Summary of a single import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportReport {
    pub outcome: ImportOutcome,
    /// Observation entries found under the structured body.
    pub observations: usize,
    /// Observations skipped because they are not vital-sign observations.
    pub not_vital_signs: usize,
    /// Vital-sign observations skipped because their date or value could not be decoded.
    pub malformed: usize,
    /// Vital-sign observations whose description matched no known vital.
    pub unrecognised: usize,
    /// Samples handed to the sink.
    pub forwarded: usize,
    /// Forwarded samples the sink already held.
    pub duplicates: usize,
    /// Forwarded samples the sink failed to save.
    pub sink_failures: usize,
}

impl ImportReport {
    fn empty(outcome: ImportOutcome) -> Self {
        Self {
            outcome,
            observations: 0,
            not_vital_signs: 0,
            malformed: 0,
            unrecognised: 0,
            forwarded: 0,
            duplicates: 0,
            sink_failures: 0,
        }
    }
}

/// Imports vital signs from clinical documents.
///
/// The importer holds no state between calls and performs no deduplication: importing the
/// same document twice forwards the same samples twice, in the same order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClinicalDocumentImporter;

impl ClinicalDocumentImporter {
    pub fn new() -> Self {
        Self
    }

    /// Import the vitals in `xml`, forwarding each recognised sample to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VitalsError::Cda`] if `xml` is not well-formed. Every other condition
    /// is reported through the returned [`ImportReport`].
    pub fn import_vitals<S>(&self, xml: &str, sink: &mut S) -> VitalsResult<ImportReport>
    where
        S: VitalSampleSink + ?Sized,
    {
        let document = Document::parse(xml)?;

        let observations = match cda::locate_vitals(&document)? {
            VitalsLookup::NotClinicalDocument => {
                tracing::debug!(
                    "root element <{}> is not a clinical document, nothing to import",
                    document.root().local_name()
                );
                return Ok(ImportReport::empty(ImportOutcome::NotClinicalDocument));
            }
            VitalsLookup::NoVitalsSection => {
                tracing::debug!("no vital signs section, nothing to import");
                return Ok(ImportReport::empty(ImportOutcome::NoVitalsSection));
            }
            VitalsLookup::Observations(observations) => observations,
        };

        tracing::info!("found patient vitals: {} observations", observations.len());

        let mut report = ImportReport::empty(ImportOutcome::Imported);
        report.observations = observations.len();

        for (index, observation) in observations.into_iter().enumerate() {
            let entry = match cda::read_entry(observation) {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    report.not_vital_signs += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("skipping observation {}: {}", index, e);
                    report.malformed += 1;
                    continue;
                }
            };

            if entry.kinds.is_empty() {
                report.unrecognised += 1;
                continue;
            }

            for sample in entry.samples() {
                report.forwarded += 1;
                tracing::debug!("forwarding {}", sample);
                match sink.save(&sample) {
                    Ok(SaveOutcome::Saved) => {}
                    Ok(SaveOutcome::Duplicate) => report.duplicates += 1,
                    Err(e) => {
                        tracing::warn!("failed to save {}: {}", sample, e);
                        report.sink_failures += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VitalsError;
    use chrono::NaiveDate;
    use vitals_types::{Unit, VitalKind, VitalSample};

    /// Records every sample verbatim.
    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<VitalSample>,
        fail_kind: Option<VitalKind>,
    }

    impl VitalSampleSink for RecordingSink {
        fn save(&mut self, sample: &VitalSample) -> VitalsResult<SaveOutcome> {
            self.calls.push(sample.clone());
            if self.fail_kind == Some(sample.kind) {
                return Err(VitalsError::InvalidInput("sink unavailable".into()));
            }
            Ok(SaveOutcome::Saved)
        }
    }

    fn observation(description: &str, date: &str, value: &str) -> String {
        format!(
            r#"<component>
  <observation classCode="OBS" moodCode="EVN">
    <templateId root="2.16.840.1.113883.10.20.22.4.27"/>
    <text>{description}</text>
    <effectiveTime value="{date}"/>
    <value value="{value}"/>
  </observation>
</component>"#
        )
    }

    fn clinical_document(section_template: &str, components: &[String]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ClinicalDocument xmlns="urn:hl7-org:v3">
  <component>
    <structuredBody>
      <component>
        <section>
          <templateId root="{section_template}"/>
          <entry>
            <organizer classCode="CLUSTER" moodCode="EVN">{}</organizer>
          </entry>
        </section>
      </component>
    </structuredBody>
  </component>
</ClinicalDocument>"#,
            components.concat()
        )
    }

    fn vitals_document(components: &[String]) -> String {
        clinical_document(cda::VITAL_SIGNS_SECTION_TEMPLATE_ID, components)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn import(xml: &str) -> (ImportReport, Vec<VitalSample>) {
        let mut sink = RecordingSink::default();
        let report = ClinicalDocumentImporter::new()
            .import_vitals(xml, &mut sink)
            .expect("import should succeed");
        (report, sink.calls)
    }

    #[test]
    fn imports_single_weight_observation() {
        let xml = vitals_document(&[observation("Patient weight", "20170424", "154.5")]);
        let (report, calls) = import(&xml);

        assert_eq!(
            calls,
            vec![VitalSample {
                kind: VitalKind::BodyMass,
                value: 154.5,
                unit: Unit::Pound,
                date: date(2017, 4, 24),
            }]
        );
        assert_eq!(report.outcome, ImportOutcome::Imported);
        assert_eq!(report.forwarded, 1);
    }

    #[test]
    fn non_clinical_root_produces_no_calls() {
        let xml = vitals_document(&[observation("Patient weight", "20170424", "154.5")])
            .replace("ClinicalDocument", "Bundle");
        let (report, calls) = import(&xml);

        assert!(calls.is_empty());
        assert_eq!(report.outcome, ImportOutcome::NotClinicalDocument);
    }

    #[test]
    fn missing_vitals_section_produces_no_calls() {
        let xml = clinical_document(
            "2.16.840.1.113883.10.20.22.2.3.1",
            &[observation("Patient weight", "20170424", "154.5")],
        );
        let (report, calls) = import(&xml);

        assert!(calls.is_empty());
        assert_eq!(report.outcome, ImportOutcome::NoVitalsSection);
    }

    #[test]
    fn multiple_keywords_produce_one_call_each() {
        let xml = vitals_document(&[observation("weight for height", "20170424", "1.5")]);
        let (_, calls) = import(&xml);

        let kinds: Vec<VitalKind> = calls.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![VitalKind::BodyMass, VitalKind::Height]);
        assert!(calls.iter().all(|c| c.date == date(2017, 4, 24)));
        assert_eq!(calls[1].unit, Unit::Inch);
    }

    #[test]
    fn maps_every_keyword_to_its_unit() {
        let xml = vitals_document(&[
            observation("bmi", "20170424", "22.8"),
            observation("Body temperature", "20170424", "98.6"),
            observation("heart rate", "20170424", "72"),
        ]);
        let (_, calls) = import(&xml);

        let mapped: Vec<(VitalKind, Unit)> = calls.iter().map(|c| (c.kind, c.unit)).collect();
        assert_eq!(
            mapped,
            vec![
                (VitalKind::BodyMassIndex, Unit::Count),
                (VitalKind::BodyTemperature, Unit::DegreeFahrenheit),
                (VitalKind::HeartRate, Unit::CountPerMinute),
            ]
        );
    }

    #[test]
    fn unrecognised_and_malformed_entries_do_not_stop_the_import() {
        let xml = vitals_document(&[
            observation("Systolic blood pressure", "20170424", "120"),
            observation("Patient weight", "2017", "150"),
            observation("Patient weight", "20170424", "heavy"),
            observation("Patient height", "20170501", "69"),
        ]);
        let (report, calls) = import(&xml);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, VitalKind::Height);
        assert_eq!(calls[0].date, date(2017, 5, 1));
        assert_eq!(report.observations, 4);
        assert_eq!(report.unrecognised, 1);
        assert_eq!(report.malformed, 2);
        assert_eq!(report.forwarded, 1);
    }

    #[test]
    fn observations_without_vital_sign_marker_are_skipped() {
        let other = r#"<component>
  <observation classCode="OBS" moodCode="EVN">
    <templateId root="2.16.840.1.113883.10.20.22.4.2"/>
    <text>weight</text>
    <effectiveTime value="20170424"/>
    <value value="1"/>
  </observation>
</component>"#
            .to_string();
        let xml = vitals_document(&[other]);
        let (report, calls) = import(&xml);

        assert!(calls.is_empty());
        assert_eq!(report.not_vital_signs, 1);
    }

    #[test]
    fn sink_failures_are_counted_and_import_continues() {
        let xml = vitals_document(&[
            observation("Patient weight", "20170424", "154.5"),
            observation("Patient height", "20170424", "69"),
        ]);
        let mut sink = RecordingSink {
            fail_kind: Some(VitalKind::BodyMass),
            ..RecordingSink::default()
        };
        let report = ClinicalDocumentImporter::new()
            .import_vitals(&xml, &mut sink)
            .expect("import should succeed");

        assert_eq!(sink.calls.len(), 2, "failed save is not retried");
        assert_eq!(report.sink_failures, 1);
        assert_eq!(report.forwarded, 2);
    }

    #[test]
    fn importing_twice_repeats_the_same_calls() {
        let xml = vitals_document(&[
            observation("Patient weight", "20170424", "154.5"),
            observation("heart rate", "20170424", "72"),
        ]);
        let mut sink = RecordingSink::default();
        let importer = ClinicalDocumentImporter::new();

        importer.import_vitals(&xml, &mut sink).expect("first import");
        let first = sink.calls.clone();
        importer.import_vitals(&xml, &mut sink).expect("second import");

        assert_eq!(first.len(), 2);
        assert_eq!(sink.calls[..2], sink.calls[2..]);
        assert_eq!(sink.calls[..2], first[..]);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let mut sink = RecordingSink::default();
        let err = ClinicalDocumentImporter::new()
            .import_vitals("<ClinicalDocument><component>", &mut sink)
            .expect_err("should fail to parse");

        assert!(matches!(err, VitalsError::Cda(_)));
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn deeply_nested_document_is_an_error() {
        let xml = format!("{}{}", "<a>".repeat(200_000), "</a>".repeat(200_000));
        let mut sink = RecordingSink::default();
        let err = ClinicalDocumentImporter::new()
            .import_vitals(&xml, &mut sink)
            .expect_err("should reject deep nesting");

        assert!(matches!(err, VitalsError::Cda(_)));
        assert!(sink.calls.is_empty());
    }
}
