use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::OnceLock;

use super::error::DesignError;
use super::plate::PlateGeometry;
use super::plating::PlatingRun;

const ID_LENGTH: usize = 8;
// Bytes of a v4 uuid that are fully random. Byte 6 holds the version and byte 8 the variant
const RANDOM_BYTES: [usize; ID_LENGTH] = [0, 1, 2, 3, 4, 5, 9, 10];
const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
// "Mostly" valid; some exotic addresses will not pass
const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";
const ID_PATTERN: &str = r"^[A-Za-z0-9]+$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

fn id_regex() -> &'static Regex {
    static ID: OnceLock<Regex> = OnceLock::new();
    ID.get_or_init(|| Regex::new(ID_PATTERN).expect("id pattern is valid"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Identifier of a stored design. Only letters and digits, so it is always safe to use as a
/// file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DesignId(String);

impl DesignId {
    /// Generate a new random id of 8 alphanumeric characters
    pub fn generate() -> Self {
        let bytes = uuid::Uuid::new_v4().into_bytes();
        let id: String = RANDOM_BYTES
            .iter()
            .map(|idx| ID_ALPHABET[bytes[*idx] as usize % ID_ALPHABET.len()] as char)
            .collect();
        Self(id)
    }

    pub fn parse(id: &str) -> Result<Self, DesignError> {
        if id_regex().is_match(id) {
            Ok(Self(id.to_string()))
        } else {
            Err(DesignError::BadId(id.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DesignId {
    type Error = DesignError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DesignId> for String {
    fn from(value: DesignId) -> Self {
        value.0
    }
}

impl Display for DesignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipetType {
    Single,
    Multi8,
}

impl FromStr for PipetType {
    type Err = DesignError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "multi8" => Ok(Self::Multi8),
            _ => Err(DesignError::BadPipetType(s.to_string())),
        }
    }
}

impl Display for PipetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Multi8 => write!(f, "multi8"),
        }
    }
}

/// The raw, untrusted parameters of a new design, as typed by the user
#[derive(Debug, Clone, Default)]
pub struct DesignRequest {
    pub email: String,
    pub description: String,
    pub pipet_type: String,
    pub plate_type: String,
    pub share_design: bool,
}

/// A DesignRequest that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignSettings {
    pub email: Option<String>,
    pub description: String,
    pub pipet_type: PipetType,
    pub plate_type: PlateGeometry,
    pub share_design: bool,
}

impl DesignRequest {
    pub fn validate(&self) -> Result<DesignSettings, DesignError> {
        let email = self.email.trim();
        if !email.is_empty() && !is_valid_email(email) {
            return Err(DesignError::BadEmail(email.to_string()));
        }

        let description = self.description.trim();
        if description.is_empty() {
            return Err(DesignError::MissingDescription);
        }

        let pipet_type = PipetType::from_str(self.pipet_type.trim())?;
        let plate_type = PlateGeometry::from_str(&self.plate_type)
            .map_err(|_| DesignError::BadPlateType(self.plate_type.trim().to_string()))?;

        if pipet_type == PipetType::Multi8 && plate_type == PlateGeometry::Wells384 {
            return Err(DesignError::UnsupportedCombination);
        }

        Ok(DesignSettings {
            email: (!email.is_empty()).then(|| email.to_string()),
            description: description.to_string(),
            pipet_type,
            plate_type,
            share_design: self.share_design,
        })
    }
}

/// The JSON sidecar stored next to each uploaded CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignInfo {
    pub email: String,
    pub description: String,
    pub id: DesignId,
    pub time: String,
    pub numsteps: usize,
    pub srcplates: Vec<String>,
    pub destplates: Vec<String>,
    pub pipet_type: PipetType,
    pub plate_type: PlateGeometry,
    pub share_design: bool,
}

impl DesignInfo {
    /// Summarize a freshly parsed run
    pub fn new(id: DesignId, settings: &DesignSettings, run: &PlatingRun, time: String) -> Self {
        Self {
            email: settings.email.clone().unwrap_or_default(),
            description: settings.description.clone(),
            id,
            time,
            numsteps: run.len(),
            srcplates: run.source_plates(),
            destplates: run.dest_plates(),
            pipet_type: settings.pipet_type,
            plate_type: settings.plate_type,
            share_design: settings.share_design,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DesignRequest {
        DesignRequest {
            email: String::from(" someone@wi.mit.edu "),
            description: String::from(" Pooling plate 3 "),
            pipet_type: String::from("single"),
            plate_type: String::from("96"),
            share_design: true,
        }
    }

    #[test]
    fn test_generated_ids() {
        for _ in 0..50 {
            let id = DesignId::generate();
            assert_eq!(id.as_str().len(), ID_LENGTH);
            assert!(DesignId::parse(id.as_str()).is_ok());
        }
    }

    #[test]
    fn test_generated_ids_use_whole_alphabet() {
        // Every position, the 7th included, should draw from more than a uuid nibble's worth
        for position in 0..ID_LENGTH {
            let seen: fxhash::FxHashSet<u8> = (0..500)
                .map(|_| DesignId::generate().as_str().as_bytes()[position])
                .collect();
            assert!(seen.len() > 16, "position {position} only saw {}", seen.len());
        }
    }

    #[test]
    fn test_id_validation() {
        assert!(DesignId::parse("xT44MJHe").is_ok());
        assert!(DesignId::parse("").is_err());
        assert!(DesignId::parse("../etc").is_err());
        assert!(DesignId::parse("abc def").is_err());
        assert!(serde_json::from_str::<DesignId>("\"a/b\"").is_err());
    }

    #[test]
    fn test_email() {
        assert!(is_valid_email("dina@wi.mit.edu"));
        assert!(is_valid_email("first.last+tag@example.co.uk"));
        assert!(!is_valid_email("no-at-sign.org"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn test_valid_request() {
        let settings = request().validate().unwrap();
        assert_eq!(settings.email.as_deref(), Some("someone@wi.mit.edu"));
        assert_eq!(settings.description, "Pooling plate 3");
        assert_eq!(settings.pipet_type, PipetType::Single);
        assert_eq!(settings.plate_type, PlateGeometry::Wells96);

        let no_email = DesignRequest {
            email: String::new(),
            ..request()
        };
        assert_eq!(no_email.validate().unwrap().email, None);
    }

    #[test]
    fn test_invalid_requests() {
        let bad_email = DesignRequest {
            email: String::from("nope"),
            ..request()
        };
        assert_eq!(
            bad_email.validate(),
            Err(DesignError::BadEmail(String::from("nope")))
        );
        let no_desc = DesignRequest {
            description: String::from("   "),
            ..request()
        };
        assert_eq!(no_desc.validate(), Err(DesignError::MissingDescription));
        let bad_pipet = DesignRequest {
            pipet_type: String::from("multi12"),
            ..request()
        };
        assert!(matches!(bad_pipet.validate(), Err(DesignError::BadPipetType(_))));
        let bad_plate = DesignRequest {
            plate_type: String::from("48"),
            ..request()
        };
        assert_eq!(
            bad_plate.validate(),
            Err(DesignError::BadPlateType(String::from("48")))
        );
        let multi_384 = DesignRequest {
            pipet_type: String::from("multi8"),
            plate_type: String::from("384"),
            ..request()
        };
        assert_eq!(multi_384.validate(), Err(DesignError::UnsupportedCombination));
    }
}
