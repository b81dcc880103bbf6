use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::error::{GeometryError, WellError};

const ROWS_96: u16 = 8;
const ROWS_384: u16 = 16;

/// The well layout of a microplate.
///
/// Serialized as the plain well count (`96` or `384`) so that the stored sidecar
/// and configuration files stay compatible with the web front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PlateGeometry {
    #[default]
    Wells96,
    Wells384,
}

impl PlateGeometry {
    pub fn row_count(&self) -> u16 {
        match self {
            Self::Wells96 => ROWS_96,
            Self::Wells384 => ROWS_384,
        }
    }

    pub fn total_wells(&self) -> u16 {
        match self {
            Self::Wells96 => 96,
            Self::Wells384 => 384,
        }
    }

    /// Columns are derived, never stored
    pub fn column_count(&self) -> u16 {
        self.total_wells().div_ceil(self.row_count())
    }
}

impl TryFrom<u32> for PlateGeometry {
    type Error = GeometryError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            96 => Ok(Self::Wells96),
            384 => Ok(Self::Wells384),
            _ => Err(GeometryError::UnsupportedGeometry(value)),
        }
    }
}

impl From<PlateGeometry> for u32 {
    fn from(value: PlateGeometry) -> Self {
        value.total_wells() as u32
    }
}

impl FromStr for PlateGeometry {
    type Err = GeometryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let count: u32 = s
            .trim()
            .parse()
            .map_err(|_| GeometryError::UnsupportedGeometry(0))?;
        Self::try_from(count)
    }
}

impl Display for PlateGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-well", self.total_wells())
    }
}

/// The row/column label of a well, e.g. `B02`.
///
/// Only ever produced from a [`WellAddress`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WellName(String);

impl WellName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WellName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for WellName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A validated 1-based well index on a plate of known geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WellAddress {
    index: u16,
    geometry: PlateGeometry,
}

impl WellAddress {
    /// Create a new WellAddress. Indices outside `[1, total_wells]` are rejected, never clamped
    pub fn new(index: i64, geometry: PlateGeometry) -> Result<Self, WellError> {
        if index < 1 || index > geometry.total_wells() as i64 {
            return Err(WellError::OutOfRange { index, geometry });
        }
        Ok(Self {
            index: index as u16,
            geometry,
        })
    }

    /// Coerce a text field (as found in a CSV cell) into a WellAddress
    pub fn parse(field: &str, geometry: PlateGeometry) -> Result<Self, WellError> {
        let field = field.trim();
        let index: i64 = field
            .parse()
            .map_err(|_| WellError::NotANumber(field.to_string()))?;
        Self::new(index, geometry)
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn geometry(&self) -> PlateGeometry {
        self.geometry
    }

    /// Row letter followed by the zero-padded column number
    pub fn name(&self) -> WellName {
        let rows = self.geometry.row_count();
        let offset = self.index - 1;
        let row = char::from(b'A' + (offset % rows) as u8);
        let column = offset / rows + 1;
        WellName(format!("{row}{column:02}"))
    }
}

/// Translate a 1-based well index into its coordinate name for the given geometry
pub fn well_name(index: i64, geometry: PlateGeometry) -> Result<WellName, WellError> {
    Ok(WellAddress::new(index, geometry)?.name())
}
