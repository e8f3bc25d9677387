#[allow(clippy::single_component_path_imports)]
use serde_yaml;

#[derive(Debug, thiserror::Error)]
pub enum VitalsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("{0}")]
    Translation(String),
    #[error("health profile not found at {}", .0.display())]
    ProfileNotFound(std::path::PathBuf),

    #[error("clinical document error: {0}")]
    Cda(#[from] cda::CdaError),
    #[error("unit error: {0}")]
    Unit(#[from] vitals_types::UnitError),
}

pub type VitalsResult<T> = std::result::Result<T, VitalsError>;
