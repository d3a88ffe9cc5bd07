//! Hatch manifest serialization.
//!
//! The manifest is the index downstream consumers read first. It lists every
//! surviving asset once, videos separately, together with the asset's canonical
//! URI, title, and whether it is top-level.
//!
//! # Output Structure
//!
//! ```text
//! hatch_root/
//! ├── hatch_manifest.json
//! ├── <assetId>.metadata
//! ├── <assetId>.data        # only for assets with a payload
//! └── <assetId>.errors      # only for assets that failed
//! ```
//!
//! Only one dialect is produced: version [`HATCH_VERSION`], with per-entry
//! title, URI, and top-level flag.

use crate::error::StorageError;
use crate::models::AssetId;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Bumped on incompatible changes to the manifest format.
pub const HATCH_VERSION: u32 = 2;

pub const MANIFEST_FILENAME: &str = "hatch_manifest.json";

/// One asset as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: AssetId,
    /// The asset's canonical URI.
    pub uri: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "isTopLevel")]
    pub is_top_level: bool,
}

/// The persisted `hatch_manifest.json` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub language: String,
    pub hatch_version: u32,
    pub assets: Vec<ManifestEntry>,
    pub videos: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            hatch_version: HATCH_VERSION,
            assets: Vec::new(),
            videos: Vec::new(),
        }
    }

    /// All entries, assets first, then videos.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.assets.iter().chain(self.videos.iter())
    }

    pub fn len(&self) -> usize {
        self.assets.len() + self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write the manifest to [`MANIFEST_FILENAME`] under the storage root.
#[instrument(level = "info", skip_all, fields(name = %manifest.name, entries = manifest.len()))]
pub async fn write_manifest(manifest: &Manifest, storage: &dyn Storage) -> Result<(), StorageError> {
    let value = serde_json::to_value(manifest)?;
    storage.write_json(MANIFEST_FILENAME, &value).await?;
    info!(
        assets = manifest.assets.len(),
        videos = manifest.videos.len(),
        "Wrote hatch manifest"
    );
    Ok(())
}

/// Load the manifest of a hatch directory.
pub async fn read_manifest(hatch_dir: &Path) -> Result<Manifest, StorageError> {
    let raw = fs::read_to_string(hatch_dir.join(MANIFEST_FILENAME)).await?;
    Ok(serde_json::from_str(&raw)?)
}
