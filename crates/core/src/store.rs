//! File-backed sample store.
//!
//! Samples are kept in one YAML ledger per vital kind:
//!
//! ```text
//! <data_dir>/
//!   samples/
//!     body_mass.yaml
//!     height.yaml
//!     ...
//! ```
//!
//! Each ledger is strictly validated on read (`deny_unknown_fields`, kind must match the file)
//! and rewritten whole on every save. Saving a sample identical to one already stored (same
//! date, value and unit) is a no-op reported as [`SaveOutcome::Duplicate`].

use crate::config::CoreConfig;
use crate::constants::LEDGER_EXTENSION;
use crate::sink::{SaveOutcome, VitalSampleSink};
use crate::{VitalsError, VitalsResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use vitals_types::{Unit, VitalKind, VitalSample};

/// Sample store rooted at the configured data directory.
#[derive(Clone, Debug)]
pub struct SampleStore {
    cfg: Arc<CoreConfig>,
}

impl SampleStore {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    fn ledger_path(&self, kind: VitalKind) -> PathBuf {
        self.cfg
            .samples_dir()
            .join(format!("{}.{LEDGER_EXTENSION}", kind.as_str()))
    }

    /// All stored samples of `kind`, oldest first.
    ///
    /// Samples sharing a date keep the order in which they were saved.
    pub fn samples(&self, kind: VitalKind) -> VitalsResult<Vec<VitalSample>> {
        let mut samples = self.read_ledger(kind)?;
        samples.sort_by_key(|s| s.date);
        Ok(samples)
    }

    /// The latest sample of `kind` by date, or `None` if nothing is stored.
    ///
    /// When several samples share the latest date, the one saved last wins.
    pub fn most_recent(&self, kind: VitalKind) -> VitalsResult<Option<VitalSample>> {
        let samples = self.read_ledger(kind)?;
        Ok(samples.into_iter().fold(None, |best, sample| match best {
            Some(best) if best.date > sample.date => Some(best),
            _ => Some(sample),
        }))
    }

    /// Store a body-mass-index sample for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`VitalsError::InvalidInput`] if `bmi` is not a positive finite number, or a
    /// storage error if the ledger cannot be read or written.
    pub fn save_body_mass_index(&mut self, bmi: f64, date: NaiveDate) -> VitalsResult<SaveOutcome> {
        if !bmi.is_finite() || bmi <= 0.0 {
            return Err(VitalsError::InvalidInput(format!(
                "body mass index must be a positive number, got {bmi}"
            )));
        }

        self.save(&VitalSample {
            kind: VitalKind::BodyMassIndex,
            value: bmi,
            unit: Unit::Count,
            date,
        })
    }

    fn read_ledger(&self, kind: VitalKind) -> VitalsResult<Vec<VitalSample>> {
        let path = self.ledger_path(kind);
        if !path.is_file() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&path).map_err(VitalsError::FileRead)?;
        let wire = parse_ledger(&text)?;

        if wire.kind != kind {
            return Err(VitalsError::Translation(format!(
                "ledger {} holds {} samples, expected {kind}",
                path.display(),
                wire.kind
            )));
        }

        Ok(wire
            .samples
            .into_iter()
            .map(|s| VitalSample {
                kind,
                value: s.value,
                unit: s.unit,
                date: s.date,
            })
            .collect())
    }

    fn write_ledger(&self, kind: VitalKind, samples: &[VitalSample]) -> VitalsResult<()> {
        let dir = self.cfg.samples_dir();
        fs::create_dir_all(&dir).map_err(VitalsError::StorageDirCreation)?;

        let wire = LedgerWire {
            kind,
            samples: samples
                .iter()
                .map(|s| SampleWire {
                    date: s.date,
                    value: s.value,
                    unit: s.unit,
                })
                .collect(),
        };
        let text = serde_yaml::to_string(&wire).map_err(VitalsError::YamlSerialization)?;

        // Write beside the ledger and rename so a failed write never truncates it.
        let path = self.ledger_path(kind);
        let staging = path.with_extension(format!("{LEDGER_EXTENSION}.tmp"));
        fs::write(&staging, text).map_err(VitalsError::FileWrite)?;
        fs::rename(&staging, &path).map_err(VitalsError::FileWrite)
    }
}

impl VitalSampleSink for SampleStore {
    fn save(&mut self, sample: &VitalSample) -> VitalsResult<SaveOutcome> {
        if !sample.value.is_finite() {
            return Err(VitalsError::InvalidInput(format!(
                "{} value must be finite",
                sample.kind
            )));
        }

        let mut samples = self.read_ledger(sample.kind)?;

        let duplicate = samples
            .iter()
            .any(|s| s.date == sample.date && s.unit == sample.unit && s.value == sample.value);
        if duplicate {
            tracing::debug!("sample already stored, skipping: {}", sample);
            return Ok(SaveOutcome::Duplicate);
        }

        samples.push(sample.clone());
        self.write_ledger(sample.kind, &samples)?;
        tracing::info!("saved sample: {}", sample);
        Ok(SaveOutcome::Saved)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct LedgerWire {
    kind: VitalKind,
    #[serde(default)]
    samples: Vec<SampleWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct SampleWire {
    date: NaiveDate,
    value: f64,
    unit: Unit,
}

fn parse_ledger(yaml_text: &str) -> VitalsResult<LedgerWire> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
    serde_path_to_error::deserialize::<_, LedgerWire>(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() {
            "<root>"
        } else {
            path.as_str()
        };
        VitalsError::Translation(format!("sample ledger schema mismatch at {path}: {source}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store(dir: &std::path::Path) -> SampleStore {
        let cfg = CoreConfig::new(dir.to_path_buf()).expect("valid config");
        SampleStore::new(Arc::new(cfg))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn weight(value: f64, on: NaiveDate) -> VitalSample {
        VitalSample::imported(VitalKind::BodyMass, value, on)
    }

    #[test]
    fn empty_store_has_no_samples() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(temp_dir.path());

        assert!(store.samples(VitalKind::Height).expect("samples").is_empty());
        assert_eq!(store.most_recent(VitalKind::Height).expect("most recent"), None);
    }

    #[test]
    fn saves_and_reads_back_samples() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = test_store(temp_dir.path());

        let sample = weight(154.5, date(2017, 4, 24));
        assert_eq!(store.save(&sample).expect("save"), SaveOutcome::Saved);

        assert_eq!(store.samples(VitalKind::BodyMass).expect("samples"), vec![sample]);
        assert!(temp_dir.path().join("samples/body_mass.yaml").is_file());
        assert!(!temp_dir.path().join("samples/body_mass.yaml.tmp").exists());
    }

    #[test]
    fn identical_sample_is_stored_once() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = test_store(temp_dir.path());

        let sample = weight(154.5, date(2017, 4, 24));
        assert_eq!(store.save(&sample).expect("first save"), SaveOutcome::Saved);
        assert_eq!(store.save(&sample).expect("second save"), SaveOutcome::Duplicate);

        assert_eq!(store.samples(VitalKind::BodyMass).expect("samples").len(), 1);
    }

    #[test]
    fn same_date_different_value_is_not_a_duplicate() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = test_store(temp_dir.path());

        store.save(&weight(154.5, date(2017, 4, 24))).expect("save");
        let outcome = store.save(&weight(155.0, date(2017, 4, 24))).expect("save");

        assert_eq!(outcome, SaveOutcome::Saved);
        assert_eq!(store.samples(VitalKind::BodyMass).expect("samples").len(), 2);
    }

    #[test]
    fn most_recent_prefers_latest_date_then_latest_write() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = test_store(temp_dir.path());

        store.save(&weight(150.0, date(2017, 5, 1))).expect("save");
        store.save(&weight(160.0, date(2016, 1, 1))).expect("save");
        store.save(&weight(151.0, date(2017, 5, 1))).expect("save");

        let latest = store
            .most_recent(VitalKind::BodyMass)
            .expect("most recent")
            .expect("a sample");
        assert_eq!(latest.value, 151.0);

        let dates: Vec<NaiveDate> = store
            .samples(VitalKind::BodyMass)
            .expect("samples")
            .into_iter()
            .map(|s| s.date)
            .collect();
        assert_eq!(dates, vec![date(2016, 1, 1), date(2017, 5, 1), date(2017, 5, 1)]);
    }

    #[test]
    fn kinds_are_kept_in_separate_ledgers() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = test_store(temp_dir.path());

        store.save(&weight(154.5, date(2017, 4, 24))).expect("save");
        store
            .save(&VitalSample::imported(VitalKind::Height, 69.0, date(2017, 4, 24)))
            .expect("save");

        assert_eq!(store.samples(VitalKind::BodyMass).expect("samples").len(), 1);
        assert_eq!(store.samples(VitalKind::Height).expect("samples").len(), 1);
    }

    #[test]
    fn saves_body_mass_index() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = test_store(temp_dir.path());

        store
            .save_body_mass_index(22.86, date(2017, 4, 24))
            .expect("save bmi");
        let bmi = store
            .most_recent(VitalKind::BodyMassIndex)
            .expect("most recent")
            .expect("a sample");
        assert_eq!(bmi.unit, Unit::Count);
        assert_eq!(bmi.value, 22.86);

        let err = store
            .save_body_mass_index(f64::NAN, date(2017, 4, 24))
            .expect_err("should reject NaN");
        assert!(matches!(err, VitalsError::InvalidInput(_)));
    }

    #[test]
    fn rejects_ledgers_with_unknown_keys() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(temp_dir.path());
        fs::create_dir_all(temp_dir.path().join("samples")).expect("create dir");
        fs::write(
            temp_dir.path().join("samples/height.yaml"),
            "kind: height\nsamples:\n  - date: 2017-04-24\n    value: 69.0\n    unit: inch\n    source: cda\n",
        )
        .expect("write ledger");

        let err = store.samples(VitalKind::Height).expect_err("should reject");
        match err {
            VitalsError::Translation(msg) => assert!(msg.contains("source"), "{msg}"),
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_ledger_of_another_kind() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(temp_dir.path());
        fs::create_dir_all(temp_dir.path().join("samples")).expect("create dir");
        fs::write(
            temp_dir.path().join("samples/height.yaml"),
            "kind: body_mass\nsamples: []\n",
        )
        .expect("write ledger");

        let err = store.samples(VitalKind::Height).expect_err("should reject");
        assert!(matches!(err, VitalsError::Translation(msg) if msg.contains("expected height")));
    }
}
