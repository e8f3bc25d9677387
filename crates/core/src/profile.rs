//! Health profile read model.
//!
//! Combines the patient's fixed characteristics (date of birth, biological sex, blood type),
//! kept in `<data_dir>/profile.yaml`, with the most recent weight and height samples from the
//! [`SampleStore`].
//!
//! ## Profile file
//!
//! ```yaml
//! date_of_birth: 1982-06-14
//! biological_sex: female
//! blood_type: AB-
//! ```

use crate::config::CoreConfig;
use crate::store::SampleStore;
use crate::{VitalsError, VitalsResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use vitals_types::{Unit, VitalKind};

/// Biological sex as recorded in the profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiologicalSex {
    #[default]
    NotSet,
    Female,
    Male,
    Other,
}

impl BiologicalSex {
    pub fn display(self) -> &'static str {
        match self {
            BiologicalSex::NotSet => "Not set",
            BiologicalSex::Female => "Female",
            BiologicalSex::Male => "Male",
            BiologicalSex::Other => "Other",
        }
    }
}

impl std::str::FromStr for BiologicalSex {
    type Err = VitalsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(BiologicalSex::Female),
            "male" | "m" => Ok(BiologicalSex::Male),
            "other" => Ok(BiologicalSex::Other),
            "not_set" | "" => Ok(BiologicalSex::NotSet),
            _ => Err(VitalsError::InvalidInput(format!(
                "unknown biological sex: {s}"
            ))),
        }
    }
}

/// ABO blood group with Rh factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodType {
    #[default]
    #[serde(rename = "not_set")]
    NotSet,
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub fn display(self) -> &'static str {
        match self {
            BloodType::NotSet => "Not set",
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }
}

impl std::str::FromStr for BloodType {
    type Err = VitalsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        if wanted.is_empty() || wanted == "NOT_SET" {
            return Ok(BloodType::NotSet);
        }
        [
            BloodType::APositive,
            BloodType::ANegative,
            BloodType::BPositive,
            BloodType::BNegative,
            BloodType::AbPositive,
            BloodType::AbNegative,
            BloodType::OPositive,
            BloodType::ONegative,
        ]
        .into_iter()
        .find(|t| t.display() == wanted)
        .ok_or_else(|| VitalsError::InvalidInput(format!("unknown blood type: {s}")))
    }
}

/// Fixed patient characteristics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Characteristics {
    pub date_of_birth: NaiveDate,
    pub biological_sex: BiologicalSex,
    pub blood_type: BloodType,
}

impl Characteristics {
    /// Parse characteristics from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`VitalsError::Translation`] naming the failing field if the YAML does not
    /// match the profile schema (including unknown keys).
    pub fn parse(yaml_text: &str) -> VitalsResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, CharacteristicsWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(VitalsError::Translation(format!(
                    "profile schema mismatch at {path}: {source}"
                )));
            }
        };

        Ok(Self {
            date_of_birth: wire.date_of_birth,
            biological_sex: wire.biological_sex,
            blood_type: wire.blood_type,
        })
    }

    /// Render characteristics as YAML text.
    pub fn render(&self) -> VitalsResult<String> {
        let wire = CharacteristicsWire {
            date_of_birth: self.date_of_birth,
            biological_sex: self.biological_sex,
            blood_type: self.blood_type,
        };
        serde_yaml::to_string(&wire).map_err(VitalsError::YamlSerialization)
    }

    /// Age in calendar years on `today`: this year minus the birth year.
    ///
    /// # Errors
    ///
    /// Returns [`VitalsError::InvalidInput`] if the date of birth is after `today`.
    pub fn age_on(&self, today: NaiveDate) -> VitalsResult<u32> {
        if self.date_of_birth > today {
            return Err(VitalsError::InvalidInput(format!(
                "date of birth {} is in the future",
                self.date_of_birth
            )));
        }
        Ok(today.year().abs_diff(self.date_of_birth.year()))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct CharacteristicsWire {
    date_of_birth: NaiveDate,
    #[serde(default)]
    biological_sex: BiologicalSex,
    #[serde(default)]
    blood_type: BloodType,
}

/// Everything the profile screen shows.
#[derive(Clone, Debug, PartialEq)]
pub struct HealthProfile {
    pub age: u32,
    pub biological_sex: BiologicalSex,
    pub blood_type: BloodType,
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
}

impl HealthProfile {
    /// Body-mass index (kg/m²) from the current weight and height.
    pub fn body_mass_index(&self) -> Option<f64> {
        let weight = self.weight_kg?;
        let height = self.height_m?;
        if height <= 0.0 {
            return None;
        }
        Some(weight / (height * height))
    }
}

/// Reads and writes the health profile.
#[derive(Clone, Debug)]
pub struct ProfileService {
    cfg: Arc<CoreConfig>,
}

impl ProfileService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Read the stored characteristics.
    ///
    /// # Errors
    ///
    /// Returns [`VitalsError::ProfileNotFound`] if no profile has been written yet.
    pub fn characteristics(&self) -> VitalsResult<Characteristics> {
        let path = self.cfg.profile_path();
        if !path.is_file() {
            return Err(VitalsError::ProfileNotFound(path));
        }
        let text = fs::read_to_string(&path).map_err(VitalsError::FileRead)?;
        Characteristics::parse(&text)
    }

    pub fn write_characteristics(&self, characteristics: &Characteristics) -> VitalsResult<()> {
        fs::create_dir_all(self.cfg.data_dir()).map_err(VitalsError::StorageDirCreation)?;
        let text = characteristics.render()?;
        fs::write(self.cfg.profile_path(), text).map_err(VitalsError::FileWrite)
    }

    /// Build the profile as of `today`.
    ///
    /// Weight and height are the most recent stored samples, converted to kilograms and
    /// metres; either is `None` if no sample has been stored.
    pub fn load(&self, store: &SampleStore, today: NaiveDate) -> VitalsResult<HealthProfile> {
        let characteristics = self.characteristics()?;
        let age = characteristics.age_on(today)?;

        let weight_kg = store
            .most_recent(VitalKind::BodyMass)?
            .map(|s| s.value_in(Unit::Kilogram))
            .transpose()?;
        let height_m = store
            .most_recent(VitalKind::Height)?
            .map(|s| s.value_in(Unit::Meter))
            .transpose()?;

        Ok(HealthProfile {
            age,
            biological_sex: characteristics.biological_sex,
            blood_type: characteristics.blood_type,
            weight_kg,
            height_m,
        })
    }
}
