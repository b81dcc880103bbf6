use std::fs::File;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::community::{CommunityDesign, CommunityList};
use super::config::Config;
use super::design::{DesignId, DesignInfo, DesignRequest};
use super::error::StoreError;
use super::plating::{load_plating_csv, PlatingRun};

const CSV_EXTENSION: &str = "csv";
const JSON_EXTENSION: &str = "json";

/// DesignStore keeps uploaded plating designs on disk.
///
/// Each design is two files in the upload directory: the CSV exactly as uploaded
/// (`<id>.csv`) and a JSON sidecar with its metadata (`<id>.json`). Runs are never stored;
/// they are rebuilt by parsing the CSV again whenever they are needed.
#[derive(Debug, Clone)]
pub struct DesignStore {
    config: Config,
    community: CommunityList,
}

impl DesignStore {
    /// Create a new DesignStore. The configured upload directory must already exist
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        config.get_upload_directory()?;
        Ok(Self {
            config: config.clone(),
            community: CommunityList::new(&config.get_community_file()),
        })
    }

    /// Validate and store a new design, returning its metadata.
    ///
    /// The CSV is fully parsed before anything is written, so a bad file never gets an id.
    pub fn create(
        &self,
        request: &DesignRequest,
        csv_bytes: &[u8],
    ) -> Result<DesignInfo, StoreError> {
        let settings = request.validate()?;

        if csv_bytes.is_empty() {
            return Err(StoreError::EmptyUpload);
        }
        if csv_bytes.len() as u64 > self.config.max_upload_bytes {
            return Err(StoreError::UploadTooLarge {
                size: human_bytes::human_bytes(csv_bytes.len() as f64),
                limit: human_bytes::human_bytes(self.config.max_upload_bytes as f64),
            });
        }

        let run = load_plating_csv(csv_bytes, settings.plate_type)?;

        let mut id = DesignId::generate();
        while self.exists(&id) {
            id = DesignId::generate();
        }
        let (json_path, csv_path) = self.paths_for_id_unchecked(&id);

        let time = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let info = DesignInfo::new(id.clone(), &settings, &run, time);

        write_design_files(&csv_path, csv_bytes, &json_path, &serde_json::to_string(&info)?)?;
        log::info!(
            "Stored design {id} ({} steps, {} plate, {} pipet)",
            info.numsteps,
            info.plate_type,
            info.pipet_type
        );

        if settings.share_design {
            let shared = CommunityDesign::new(
                &info.description,
                id.as_str(),
                info.plate_type,
                info.pipet_type,
            );
            // A design that fails to be shared is still a valid design
            if let Err(e) = self.community.add(shared) {
                log::warn!("Failed to add shared community design (id = '{id}'): {e}");
            }
        }

        Ok(info)
    }

    /// Get the (json, csv) paths of a design. The files are not required to exist
    pub fn paths_for_id_unchecked(&self, id: &DesignId) -> (PathBuf, PathBuf) {
        let base = self.config.upload_path.join(id.as_str());
        (
            base.with_extension(JSON_EXTENSION),
            base.with_extension(CSV_EXTENSION),
        )
    }

    /// Get the (json, csv) paths of an existing design
    pub fn paths_for_id(&self, id: &DesignId) -> Result<(PathBuf, PathBuf), StoreError> {
        let (json_path, csv_path) = self.paths_for_id_unchecked(id);
        if json_path.exists() && csv_path.exists() {
            Ok((json_path, csv_path))
        } else {
            Err(StoreError::NoSuchDesign(id.to_string()))
        }
    }

    pub fn exists(&self, id: &DesignId) -> bool {
        self.paths_for_id(id).is_ok()
    }

    pub fn load_info(&self, id: &DesignId) -> Result<DesignInfo, StoreError> {
        let (json_path, _) = self.paths_for_id(id)?;
        let json_str = std::fs::read_to_string(json_path)?;
        Ok(serde_json::from_str(&json_str)?)
    }

    /// Rebuild the run of a design from its stored CSV
    pub fn load_run(&self, id: &DesignId) -> Result<PlatingRun, StoreError> {
        let info = self.load_info(id)?;
        let (_, csv_path) = self.paths_for_id(id)?;
        Ok(load_plating_csv(File::open(csv_path)?, info.plate_type)?)
    }

    /// The `{"data": [...]}` payload of a design
    pub fn data_payload(&self, id: &DesignId) -> Result<String, StoreError> {
        Ok(self.load_run(id)?.to_json_payload()?)
    }

    /// The CSV of a design, byte for byte as it was uploaded
    pub fn csv_bytes(&self, id: &DesignId) -> Result<Vec<u8>, StoreError> {
        let (_, csv_path) = self.paths_for_id(id)?;
        Ok(std::fs::read(csv_path)?)
    }

    /// Every stored design, sorted by id
    pub fn list_ids(&self) -> Result<Vec<DesignId>, StoreError> {
        let mut ids: Vec<DesignId> = Vec::new();
        for item in self.config.upload_path.read_dir()? {
            let item_path = item?.path();
            if item_path.extension().and_then(|e| e.to_str()) != Some(JSON_EXTENSION) {
                continue;
            }
            let Some(stem) = item_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = DesignId::parse(stem) {
                if self.exists(&id) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// The demo designs followed by every shared design
    pub fn community(&self) -> Vec<CommunityDesign> {
        self.community.all(&self.config.default_shared_designs)
    }

    pub fn design_link(&self, id: &DesignId) -> String {
        self.config.design_link(id)
    }
}

/// Write the CSV and then its sidecar. A CSV is never left behind without a sidecar.
fn write_design_files(
    csv_path: &Path,
    csv_bytes: &[u8],
    json_path: &Path,
    sidecar: &str,
) -> Result<(), StoreError> {
    std::fs::write(csv_path, csv_bytes)?;
    if let Err(e) = std::fs::write(json_path, sidecar) {
        if let Err(cleanup) = std::fs::remove_file(csv_path) {
            log::warn!(
                "Could not remove {} after a failed write: {cleanup}",
                csv_path.to_string_lossy()
            );
        }
        return Err(e.into());
    }
    Ok(())
}
