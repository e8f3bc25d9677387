use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use vitals_core::{
    config::resolve_data_dir, BiologicalSex, BloodType, Characteristics, ClinicalDocumentImporter,
    CoreConfig, ImportOutcome, ProfileService, SampleStore, SaveOutcome, Unit, VitalKind,
    VitalSample,
};

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "Vital-sign import and profile CLI")]
struct Cli {
    /// Data directory (defaults to $VITALS_DATA_DIR, then ./vitals_data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import vital signs from a clinical document (CDA XML)
    Import {
        /// Path to the XML document
        file: PathBuf,
    },
    /// List stored samples of one kind
    Samples {
        /// body_mass, body_mass_index, height, body_temperature or heart_rate
        kind: VitalKind,
        /// Show values in this unit (for example kg, m or degC)
        #[arg(long)]
        unit: Option<Unit>,
    },
    /// Show the most recent sample of one kind
    Latest {
        /// body_mass, body_mass_index, height, body_temperature or heart_rate
        kind: VitalKind,
        /// Show the value in this unit (for example kg, m or degC)
        #[arg(long)]
        unit: Option<Unit>,
    },
    /// Write date of birth, biological sex and blood type
    SetProfile {
        /// Date of birth (YYYY-MM-DD)
        date_of_birth: NaiveDate,
        /// female, male or other
        #[arg(long)]
        sex: Option<BiologicalSex>,
        /// A+, A-, B+, B-, AB+, AB-, O+ or O-
        #[arg(long)]
        blood_type: Option<BloodType>,
    },
    /// Show the health profile
    Profile,
    /// Compute body-mass index from the latest weight and height and store it
    SaveBmi {
        /// Sample date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("vitals=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| resolve_data_dir(std::env::var("VITALS_DATA_DIR").ok()));
    let cfg = Arc::new(CoreConfig::new(data_dir)?);
    let today = Local::now().date_naive();

    match cli.command {
        Some(Commands::Import { file }) => {
            let xml = std::fs::read_to_string(&file)?;
            let mut store = SampleStore::new(cfg);
            match ClinicalDocumentImporter::new().import_vitals(&xml, &mut store) {
                Ok(report) => match report.outcome {
                    ImportOutcome::NotClinicalDocument => {
                        println!("{} is not a clinical document.", file.display())
                    }
                    ImportOutcome::NoVitalsSection => {
                        println!("No vital signs found in {}.", file.display())
                    }
                    ImportOutcome::Imported => println!(
                        "Imported {} samples from {} observations ({} already stored, {} failed, {} malformed, {} unrecognised).",
                        report.forwarded - report.duplicates - report.sink_failures,
                        report.observations,
                        report.duplicates,
                        report.sink_failures,
                        report.malformed,
                        report.unrecognised
                    ),
                },
                Err(e) => eprintln!("Error importing {}: {}", file.display(), e),
            }
        }
        Some(Commands::Samples { kind, unit }) => {
            let store = SampleStore::new(cfg);
            let samples = store.samples(kind)?;
            if samples.is_empty() {
                println!("No {} samples found.", kind);
            } else {
                for sample in samples {
                    let (value, unit) = displayed(&sample, unit)?;
                    println!("{}  {} {}", sample.date, value, unit);
                }
            }
        }
        Some(Commands::Latest { kind, unit }) => {
            let store = SampleStore::new(cfg);
            match store.most_recent(kind)? {
                Some(sample) => {
                    let (value, unit) = displayed(&sample, unit)?;
                    println!("{} {} {} on {}", sample.kind, value, unit, sample.date);
                }
                None => println!("No {} samples found.", kind),
            }
        }
        Some(Commands::SetProfile {
            date_of_birth,
            sex,
            blood_type,
        }) => {
            let characteristics = Characteristics {
                date_of_birth,
                biological_sex: sex.unwrap_or_default(),
                blood_type: blood_type.unwrap_or_default(),
            };
            match ProfileService::new(cfg).write_characteristics(&characteristics) {
                Ok(()) => println!("Profile saved."),
                Err(e) => eprintln!("Error saving profile: {}", e),
            }
        }
        Some(Commands::Profile) => {
            let store = SampleStore::new(cfg.clone());
            let profile = ProfileService::new(cfg).load(&store, today)?;

            println!("Age: {}", profile.age);
            println!("Biological sex: {}", profile.biological_sex.display());
            println!("Blood type: {}", profile.blood_type.display());
            match profile.weight_kg {
                Some(kg) => println!("Weight: {:.1} kg", kg),
                None => println!("Weight: -"),
            }
            match profile.height_m {
                Some(m) => println!("Height: {:.2} m", m),
                None => println!("Height: -"),
            }
            match profile.body_mass_index() {
                Some(bmi) => println!("BMI: {:.2}", bmi),
                None => println!("BMI: -"),
            }
        }
        Some(Commands::SaveBmi { date }) => {
            let mut store = SampleStore::new(cfg.clone());
            let profile = ProfileService::new(cfg).load(&store, today)?;
            let Some(bmi) = profile.body_mass_index() else {
                eprintln!("Cannot compute BMI: weight and height samples are required.");
                return Ok(());
            };
            match store.save_body_mass_index(bmi, date.unwrap_or(today)) {
                Ok(SaveOutcome::Saved) => println!("Saved BMI {:.2}.", bmi),
                Ok(SaveOutcome::Duplicate) => println!("BMI {:.2} already stored.", bmi),
                Err(e) => eprintln!("Error saving BMI: {}", e),
            }
        }
        None => {
            println!("Use 'vitals --help' for commands");
        }
    }

    Ok(())
}

/// Sample value in the requested unit, or as stored when none is given.
fn displayed(
    sample: &VitalSample,
    unit: Option<Unit>,
) -> Result<(f64, Unit), Box<dyn std::error::Error>> {
    match unit {
        Some(unit) => Ok((sample.value_in(unit)?, unit)),
        None => Ok((sample.value, sample.unit)),
    }
}
