use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::community::CommunityDesign;
use super::design::{DesignId, PipetType};
use super::error::ConfigError;
use super::plate::PlateGeometry;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;
const COMMUNITY_FILE_NAME: &str = "community.json";

/// Structure representing the application configuration. Contains the storage location
/// and the designs that are always listed in the community page.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub upload_path: PathBuf,
    pub max_upload_bytes: u64,
    pub base_url: String,
    pub default_shared_designs: Vec<CommunityDesign>,
}

impl Default for Config {
    /// Generate a new Config object with the bundled demo designs
    fn default() -> Self {
        Self {
            upload_path: PathBuf::from("./uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            base_url: String::from("http://localhost:5000"),
            default_shared_designs: default_demo_designs(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// The upload directory must exist before anything is stored in it
    pub fn get_upload_directory(&self) -> Result<&Path, ConfigError> {
        if self.upload_path.is_dir() {
            Ok(&self.upload_path)
        } else {
            Err(ConfigError::BadUploadPath(self.upload_path.clone()))
        }
    }

    /// Get the path to the shared community designs list
    pub fn get_community_file(&self) -> PathBuf {
        self.upload_path.join(COMMUNITY_FILE_NAME)
    }

    /// Link to the summary page of a stored design
    pub fn design_link(&self, id: &DesignId) -> String {
        format!("{}/show/{}", self.base_url.trim_end_matches('/'), id)
    }
}

fn default_demo_designs() -> Vec<CommunityDesign> {
    vec![
        CommunityDesign::new(
            "96-Wells, Single-Channel Demo",
            "demolnk1",
            PlateGeometry::Wells96,
            PipetType::Single,
        ),
        CommunityDesign::new(
            "96-Wells, 8-Channel Demo",
            "demolnk8",
            PlateGeometry::Wells96,
            PipetType::Multi8,
        ),
        CommunityDesign::new(
            "384-Wells, Single-Channel Demo",
            "384demo1",
            PlateGeometry::Wells384,
            PipetType::Single,
        ),
    ]
}
