//! Storage backends for hatch output.
//!
//! The core only needs to write named files under a single root. Every asset
//! writes files keyed by its own id, so concurrent writers never touch the same
//! name and no locking is needed.

use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

type Result<T> = std::result::Result<T, StorageError>;

/// Write primitive consumed by the persister and manifest writer.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Write `bytes` to `name` under the storage root, replacing any previous
    /// content. Readers never observe a partially written file.
    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Serialize `value` as pretty JSON and write it to `name`.
    async fn write_json(&self, name: &str, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_file(name, &bytes).await
    }

    /// Local directory backing this storage, if there is one.
    fn local_root(&self) -> Option<&Path> {
        None
    }
}

/// Storage in a local directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && name != "..";
        if !plain {
            return Err(StorageError::InvalidPath(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        let tmp_path = self.root.join(format!(".{name}.tmp"));
        let written = match fs::write(&tmp_path, bytes).await {
            Ok(()) => fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
        Ok(())
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
