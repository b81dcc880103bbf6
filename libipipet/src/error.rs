use std::path::PathBuf;
use thiserror::Error;

use super::plate::PlateGeometry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("Unsupported plate geometry {0}; expected 96 or 384")]
    UnsupportedGeometry(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WellError {
    #[error("Invalid well number '{0}'")]
    NotANumber(String),
    #[error("Invalid well value {index} for a {geometry} plate; expected 1 to {max}", max=.geometry.total_wells())]
    OutOfRange { index: i64, geometry: PlateGeometry },
}

#[derive(Debug, Error)]
pub enum PlatingError {
    #[error("File format not recognized: {0}")]
    UnparseableDialect(String),
    #[error("Invalid CSV content at line {row}: {reason}")]
    MalformedRow { row: u64, reason: String },
    #[error("Invalid CSV content at line {row}: well {index} does not exist on a {geometry} plate")]
    OutOfRangeWell {
        row: u64,
        index: i64,
        geometry: PlateGeometry,
    },
    #[error("Plating CSV failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

impl PlatingError {
    /// Attach a row number to a well conversion failure
    pub(crate) fn from_well(row: u64, err: WellError) -> Self {
        match err {
            WellError::OutOfRange { index, geometry } => Self::OutOfRangeWell {
                row,
                index,
                geometry,
            },
            WellError::NotANumber(_) => Self::MalformedRow {
                row,
                reason: err.to_string(),
            },
        }
    }

    /// The 1-based source line of a row-level failure, if any
    pub fn row(&self) -> Option<u64> {
        match self {
            Self::MalformedRow { row, .. } | Self::OutOfRangeWell { row, .. } => Some(*row),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Upload directory {0:?} does not exist; please create it or change the configuration")]
    BadUploadPath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("Invalid email address '{0}'")]
    BadEmail(String),
    #[error("Missing 'description' parameter")]
    MissingDescription,
    #[error("Invalid pipet type {0}")]
    BadPipetType(String),
    #[error("Invalid plate type {0}")]
    BadPlateType(String),
    #[error("Multi-channel pipetting is not currently supported for 384 well plates")]
    UnsupportedCombination,
    #[error("Invalid ID '{0}'")]
    BadId(String),
}

#[derive(Debug, Error)]
pub enum CommunityError {
    #[error("Community list failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Community list failed to parse JSON: {0}")]
    ParsingError(#[from] serde_json::Error),
    #[error("Community list lock was poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Design store failed due to request error: {0}")]
    BadRequest(#[from] DesignError),
    #[error("Design store failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("No CSV file uploaded")]
    EmptyUpload,
    #[error("Uploaded file is {size}, larger than the limit of {limit}")]
    UploadTooLarge { size: String, limit: String },
    #[error("Invalid id '{0}' (no such entry)")]
    NoSuchDesign(String),
    #[error("Design store failed due to plating CSV error: {0}")]
    PlatingError(#[from] PlatingError),
    #[error("Design store failed due to plate geometry error: {0}")]
    GeometryError(#[from] GeometryError),
    #[error("Design store failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Design store failed to convert JSON: {0}")]
    ParsingError(#[from] serde_json::Error),
    #[error("Design store failed to format a timestamp: {0}")]
    TimeError(#[from] time::error::Format),
}
