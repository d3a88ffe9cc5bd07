//! Optional compressed bundle of a hatch directory.
//!
//! With the `archive` feature enabled, [`archive_dir`] writes `<root>.tar.gz`
//! next to the hatch directory. Without it, archiving is logged and skipped so
//! callers can request it unconditionally.

use crate::error::HatchError;
use std::path::{Path, PathBuf};

/// `<dir>.tar.gz` next to `dir`, or `None` when `dir` has no final name
/// (`.`, `..`, `/`). Callers should canonicalize relative roots first.
pub fn archive_path(dir: &Path) -> Option<PathBuf> {
    let mut name = dir.file_name()?.to_os_string();
    name.push(".tar.gz");
    Some(dir.with_file_name(name))
}

/// Bundle `dir` into [`archive_path`]`(dir)`.
///
/// Returns the archive path, or `None` when the `archive` feature is off.
#[cfg(feature = "archive")]
#[tracing::instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn archive_dir(dir: &Path) -> Result<Option<PathBuf>, HatchError> {
    use flate2::{Compression, write::GzEncoder};

    let dir = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| HatchError::Archive(format!("{}: {e}", dir.display())))?;
    let (Some(target), Some(top)) = (archive_path(&dir), dir.file_name().map(PathBuf::from))
    else {
        return Err(HatchError::Archive(format!(
            "cannot archive {}: no directory name",
            dir.display()
        )));
    };
    let task_target = target.clone();
    let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let file = std::fs::File::create(&task_target)?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.append_dir_all(&top, &dir)?;
        builder.into_inner()?.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| HatchError::Archive(e.to_string()))?;
    written.map_err(|e| HatchError::Archive(e.to_string()))?;

    tracing::info!(path = %target.display(), "Wrote hatch archive");
    Ok(Some(target))
}

/// Archiving is unavailable without the `archive` feature.
#[cfg(not(feature = "archive"))]
pub async fn archive_dir(dir: &Path) -> Result<Option<PathBuf>, HatchError> {
    tracing::warn!(
        dir = %dir.display(),
        "Archive requested but the `archive` feature is disabled; skipping"
    );
    Ok(None)
}
