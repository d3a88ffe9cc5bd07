//! Hatch run configuration.

use chrono::Utc;
use std::path::{Path, PathBuf};

/// Settings for one hatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HatchConfig {
    /// Hatch name recorded in the manifest.
    pub name: String,
    /// Content language recorded in the manifest.
    pub language: String,
    /// Directory that receives every asset file and the manifest.
    pub root: PathBuf,
    /// Bundle the finished hatch into `<root>.tar.gz`.
    pub archive: bool,
}

impl HatchConfig {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            language: "en".to_string(),
            root: root.into(),
            archive: false,
        }
    }

    /// Root at `<parent>/hatch_<name>_<UTC timestamp>`.
    pub fn timestamped(name: impl Into<String>, parent: &Path) -> Self {
        let name = name.into();
        let dir = format!("hatch_{}_{}", name, Utc::now().format("%Y%m%dT%H%M%S"));
        Self::new(name, parent.join(dir))
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }
}
