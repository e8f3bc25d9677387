//! Shared domain primitives for vital-sign samples.
//!
//! These types are used by both the `cda` boundary crate (which produces recognised vitals
//! from clinical documents) and `vitals-core` (which stores and reads them back).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Errors that can occur when working with vital units.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UnitError {
    /// The two units measure different dimensions (for example mass and length).
    #[error("cannot convert {from} to {to}")]
    Incompatible { from: Unit, to: Unit },

    /// The input did not name a known unit.
    #[error("unknown unit: {0}")]
    Unknown(String),
}

/// Errors that can occur when naming a vital kind.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KindError {
    #[error("unknown vital kind: {0}")]
    Unknown(String),
}

/// The kind of physiological measurement a sample represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalKind {
    /// Body weight.
    BodyMass,
    /// Body-mass index.
    BodyMassIndex,
    /// Standing height.
    Height,
    /// Body temperature.
    BodyTemperature,
    /// Heart rate.
    HeartRate,
}

impl VitalKind {
    /// Every kind, in classification order.
    pub const ALL: [VitalKind; 5] = [
        VitalKind::BodyMass,
        VitalKind::BodyMassIndex,
        VitalKind::Height,
        VitalKind::BodyTemperature,
        VitalKind::HeartRate,
    ];

    /// Stable identifier used for file names and CLI arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            VitalKind::BodyMass => "body_mass",
            VitalKind::BodyMassIndex => "body_mass_index",
            VitalKind::Height => "height",
            VitalKind::BodyTemperature => "body_temperature",
            VitalKind::HeartRate => "heart_rate",
        }
    }

    /// The unit vitals of this kind carry when imported from a clinical document.
    pub fn import_unit(self) -> Unit {
        match self {
            VitalKind::BodyMass => Unit::Pound,
            VitalKind::BodyMassIndex => Unit::Count,
            VitalKind::Height => Unit::Inch,
            VitalKind::BodyTemperature => Unit::DegreeFahrenheit,
            VitalKind::HeartRate => Unit::CountPerMinute,
        }
    }
}

impl std::fmt::Display for VitalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VitalKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        VitalKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalised)
            .or(match normalised.as_str() {
                "weight" => Some(VitalKind::BodyMass),
                "bmi" => Some(VitalKind::BodyMassIndex),
                "temperature" => Some(VitalKind::BodyTemperature),
                _ => None,
            })
            .ok_or_else(|| KindError::Unknown(s.to_string()))
    }
}

/// Unit of measure attached to a sample value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Pound,
    Kilogram,
    Inch,
    Meter,
    DegreeFahrenheit,
    DegreeCelsius,
    /// Dimensionless count.
    Count,
    CountPerMinute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dimension {
    Mass,
    Length,
    Temperature,
    Scalar,
    Frequency,
}

const KILOGRAMS_PER_POUND: f64 = 0.453_592_37;
const METRES_PER_INCH: f64 = 0.0254;

impl Unit {
    pub const ALL: [Unit; 8] = [
        Unit::Pound,
        Unit::Kilogram,
        Unit::Inch,
        Unit::Meter,
        Unit::DegreeFahrenheit,
        Unit::DegreeCelsius,
        Unit::Count,
        Unit::CountPerMinute,
    ];

    /// Spelled-out identifier, matching the serialised form.
    pub fn name(self) -> &'static str {
        match self {
            Unit::Pound => "pound",
            Unit::Kilogram => "kilogram",
            Unit::Inch => "inch",
            Unit::Meter => "meter",
            Unit::DegreeFahrenheit => "degree_fahrenheit",
            Unit::DegreeCelsius => "degree_celsius",
            Unit::Count => "count",
            Unit::CountPerMinute => "count_per_minute",
        }
    }

    /// Short display symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Pound => "lb",
            Unit::Kilogram => "kg",
            Unit::Inch => "in",
            Unit::Meter => "m",
            Unit::DegreeFahrenheit => "degF",
            Unit::DegreeCelsius => "degC",
            Unit::Count => "count",
            Unit::CountPerMinute => "count/min",
        }
    }

    fn dimension(self) -> Dimension {
        match self {
            Unit::Pound | Unit::Kilogram => Dimension::Mass,
            Unit::Inch | Unit::Meter => Dimension::Length,
            Unit::DegreeFahrenheit | Unit::DegreeCelsius => Dimension::Temperature,
            Unit::Count => Dimension::Scalar,
            Unit::CountPerMinute => Dimension::Frequency,
        }
    }

    /// Convert `value` expressed in `self` into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::Incompatible`] if the units measure different dimensions.
    pub fn convert(self, value: f64, to: Unit) -> Result<f64, UnitError> {
        if self.dimension() != to.dimension() {
            return Err(UnitError::Incompatible { from: self, to });
        }

        let converted = match (self, to) {
            (a, b) if a == b => value,
            (Unit::Pound, Unit::Kilogram) => value * KILOGRAMS_PER_POUND,
            (Unit::Kilogram, Unit::Pound) => value / KILOGRAMS_PER_POUND,
            (Unit::Inch, Unit::Meter) => value * METRES_PER_INCH,
            (Unit::Meter, Unit::Inch) => value / METRES_PER_INCH,
            (Unit::DegreeFahrenheit, Unit::DegreeCelsius) => (value - 32.0) * 5.0 / 9.0,
            (Unit::DegreeCelsius, Unit::DegreeFahrenheit) => value * 9.0 / 5.0 + 32.0,
            _ => return Err(UnitError::Incompatible { from: self, to }),
        };

        Ok(converted)
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for Unit {
    type Err = UnitError;

    /// Accepts either the symbol (`kg`, `degC`) or the name (`kilogram`, `degree-celsius`),
    /// ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let normalised = trimmed.to_ascii_lowercase().replace(['-', ' '], "_");
        Unit::ALL
            .into_iter()
            .find(|unit| {
                unit.symbol().eq_ignore_ascii_case(trimmed) || unit.name() == normalised
            })
            .ok_or_else(|| UnitError::Unknown(s.to_string()))
    }
}

/// A single dated measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct VitalSample {
    pub kind: VitalKind,
    pub value: f64,
    pub unit: Unit,
    pub date: NaiveDate,
}

impl VitalSample {
    /// Creates a sample carrying the import unit of `kind`.
    pub fn imported(kind: VitalKind, value: f64, date: NaiveDate) -> Self {
        Self {
            kind,
            value,
            unit: kind.import_unit(),
            date,
        }
    }

    /// Returns the value converted to `unit`.
    pub fn value_in(&self, unit: Unit) -> Result<f64, UnitError> {
        self.unit.convert(self.value, unit)
    }
}

impl std::fmt::Display for VitalSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} on {}", self.kind, self.value, self.unit, self.date)
    }
}
