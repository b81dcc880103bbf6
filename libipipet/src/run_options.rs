use serde::{Deserialize, Serialize};
use std::fmt::Display;

const DEFAULT_DPI: u32 = 96;
const MIN_DPI: u32 = 10; //Anything at or below this is not a real screen

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellColor {
    #[default]
    Red,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

impl Display for WellColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
        }
    }
}

impl Display for Handedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Right => write!(f, "right"),
            Self::Left => write!(f, "left"),
        }
    }
}

/// How the run page draws the plate.
///
/// Built from loosely typed user input; anything unrecognized silently falls back to the
/// default instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub dpi: u32,
    pub well_color: WellColor,
    pub handedness: Handedness,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            well_color: WellColor::default(),
            handedness: Handedness::default(),
        }
    }
}

impl RunOptions {
    pub fn from_params(
        dpi: Option<&str>,
        well_color: Option<&str>,
        handedness: Option<&str>,
    ) -> Self {
        let dpi = dpi
            .and_then(|d| d.trim().parse::<u32>().ok())
            .filter(|d| *d > MIN_DPI)
            .unwrap_or(DEFAULT_DPI);
        let well_color = match well_color.map(str::trim) {
            Some("green") => WellColor::Green,
            _ => WellColor::Red,
        };
        let handedness = match handedness.map(str::trim) {
            Some("left") => Handedness::Left,
            _ => Handedness::Right,
        };
        Self {
            dpi,
            well_color,
            handedness,
        }
    }
}
