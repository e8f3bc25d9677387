//! Destination for recognised vital samples.

use crate::VitalsResult;
use vitals_types::VitalSample;

/// What a sink did with a sample it was handed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The sample was persisted.
    Saved,
    /// An identical sample already existed, so nothing was written.
    Duplicate,
}

/// Receives recognised vitals from the importer.
///
/// Implementations own duplicate detection and persistence. Callers give no ordering or
/// uniqueness guarantees and never retry a failed save.
pub trait VitalSampleSink {
    fn save(&mut self, sample: &VitalSample) -> VitalsResult<SaveOutcome>;
}

impl<S: VitalSampleSink + ?Sized> VitalSampleSink for &mut S {
    fn save(&mut self, sample: &VitalSample) -> VitalsResult<SaveOutcome> {
        (**self).save(sample)
    }
}
