use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::design::{DesignId, PipetType};
use super::error::CommunityError;
use super::plate::PlateGeometry;

// Serializes read-modify-write cycles on community files within this process
static COMMUNITY_LOCK: Mutex<()> = Mutex::new(());

/// An entry in the list of designs shared with everyone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityDesign {
    pub description: String,
    pub id: String,
    pub plate_type: PlateGeometry,
    pub pipet_type: PipetType,
}

impl CommunityDesign {
    pub fn new(description: &str, id: &str, plate_type: PlateGeometry, pipet_type: PipetType) -> Self {
        Self {
            description: description.to_string(),
            id: id.to_string(),
            plate_type,
            pipet_type,
        }
    }
}

/// The JSON file of designs users chose to share
#[derive(Debug, Clone)]
pub struct CommunityList {
    path: PathBuf,
}

impl CommunityList {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Append a design to the shared list.
    ///
    /// Entries with an invalid id or an empty description are ignored; returns whether the
    /// design was added.
    pub fn add(&self, design: CommunityDesign) -> Result<bool, CommunityError> {
        if DesignId::parse(&design.id).is_err() || design.description.trim().is_empty() {
            return Ok(false);
        }

        let _guard = COMMUNITY_LOCK.lock().map_err(|_| CommunityError::Poisoned)?;
        let mut designs = self.read_stored()?;
        designs.push(design);

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_string(&designs)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(true)
    }

    /// Get the designs that have been shared so far. A missing file is an empty list
    pub fn stored(&self) -> Result<Vec<CommunityDesign>, CommunityError> {
        let _guard = COMMUNITY_LOCK.lock().map_err(|_| CommunityError::Poisoned)?;
        self.read_stored()
    }

    /// The defaults followed by every shared design.
    ///
    /// If the shared list cannot be read only the defaults are returned.
    pub fn all(&self, defaults: &[CommunityDesign]) -> Vec<CommunityDesign> {
        let mut designs = defaults.to_vec();
        match self.stored() {
            Ok(stored) => designs.extend(stored),
            Err(e) => log::warn!(
                "Could not read community list {}: {e}",
                self.path.to_string_lossy()
            ),
        }
        designs
    }

    fn read_stored(&self) -> Result<Vec<CommunityDesign>, CommunityError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let json_str = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ipipet_community_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_add_and_list() {
        let dir = scratch_dir();
        let list = CommunityList::new(&dir.join("community.json"));
        assert!(list.stored().unwrap().is_empty());

        let design = CommunityDesign::new(
            "My pooling",
            "Ab12Cd34",
            PlateGeometry::Wells96,
            PipetType::Multi8,
        );
        assert!(list.add(design.clone()).unwrap());
        assert!(!list
            .add(CommunityDesign::new("", "Zz99Zz99", PlateGeometry::Wells96, PipetType::Single))
            .unwrap());
        assert!(!list
            .add(CommunityDesign::new("Bad", "../x", PlateGeometry::Wells96, PipetType::Single))
            .unwrap());

        let defaults = vec![CommunityDesign::new(
            "Demo",
            "demolnk1",
            PlateGeometry::Wells96,
            PipetType::Single,
        )];
        let all = list.all(&defaults);
        assert_eq!(all, vec![defaults[0].clone(), design]);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let dir = scratch_dir();
        let path = dir.join("community.json");
        std::fs::write(&path, "{ not json").unwrap();
        let list = CommunityList::new(&path);
        assert!(matches!(list.stored(), Err(CommunityError::ParsingError(_))));
        let defaults = vec![CommunityDesign::new(
            "Demo",
            "384demo1",
            PlateGeometry::Wells384,
            PipetType::Single,
        )];
        assert_eq!(list.all(&defaults), defaults);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
