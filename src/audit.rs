//! Re-verification of a persisted hatch directory.
//!
//! [`audit_hatch`] reads `hatch_manifest.json`, re-runs the manifest entry and
//! metadata checks against what is actually on disk, and collects the
//! `<assetId>.errors` records left behind by failed assets.

use crate::error::StorageError;
use crate::outputs::manifest::{HATCH_VERSION, read_manifest};
use crate::verify::{verify_manifest_entry, verify_metadata};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// One `<assetId>.errors` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub asset_id: String,
    pub error: String,
}

/// Findings from [`audit_hatch`].
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub name: String,
    pub entries: usize,
    /// Human-readable descriptions of everything that failed a check.
    pub problems: Vec<String>,
    /// Post-mortem records of assets that were dropped during ingestion.
    pub error_records: Vec<ErrorRecord>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Audit the hatch stored in `hatch_dir`.
///
/// # Errors
///
/// Only fails when the manifest itself cannot be read or parsed. Every other
/// finding is reported in [`AuditReport::problems`].
#[instrument(level = "info", skip_all, fields(dir = %hatch_dir.display()))]
pub async fn audit_hatch(hatch_dir: &Path) -> Result<AuditReport, StorageError> {
    let manifest = read_manifest(hatch_dir).await?;
    let mut report = AuditReport {
        name: manifest.name.clone(),
        entries: manifest.len(),
        ..AuditReport::default()
    };

    if manifest.hatch_version != HATCH_VERSION {
        report.problems.push(format!(
            "manifest has hatch_version {}, expected {}",
            manifest.hatch_version, HATCH_VERSION
        ));
    }

    for entry in manifest.entries() {
        if let Err(e) = verify_manifest_entry(entry) {
            report.problems.push(e.to_string());
        }
        let path = hatch_dir.join(entry.id.metadata_filename());
        match read_record(&path).await {
            Ok(record) => {
                if let Err(e) = verify_metadata(&record) {
                    report.problems.push(e.to_string());
                }
            }
            Err(e) => report
                .problems
                .push(format!("asset {}: cannot read metadata: {e}", entry.id)),
        }
    }

    report.error_records = read_error_records(hatch_dir).await?;
    debug!(
        problems = report.problems.len(),
        error_records = report.error_records.len(),
        "Audit complete"
    );
    Ok(report)
}

async fn read_record(path: &Path) -> Result<Map<String, Value>, StorageError> {
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn read_error_records(hatch_dir: &Path) -> Result<Vec<ErrorRecord>, StorageError> {
    let mut records = Vec::new();
    let mut dir = fs::read_dir(hatch_dir).await?;
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == "errors") {
            continue;
        }
        let Ok(record) = read_record(&path).await else {
            debug!(path = %path.display(), "Skipping unreadable error record");
            continue;
        };
        let field = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        records.push(ErrorRecord {
            asset_id: field("assetID"),
            error: field("error"),
        });
    }
    records.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HatchConfig;
    use crate::hatch::Hatch;
    use crate::models::Asset;

    fn article(n: usize) -> Asset {
        let mut article = Asset::article();
        article
            .set_metadata("canonicalURI", format!("https://example.com/{n}"))
            .unwrap();
        article.set_metadata("title", format!("Story {n}")).unwrap();
        article.set_metadata("body", "<p>text</p>").unwrap();
        article
    }

    #[tokio::test]
    async fn test_audit_of_fresh_hatch_is_clean() {
        let tmp = tempfile::tempdir().unwrap();
        let mut hatch = Hatch::new(HatchConfig::new("audit", tmp.path()))
            .await
            .unwrap();
        hatch.save_asset(article(0)).unwrap();
        hatch.save_asset(article(1)).unwrap();
        // missing canonical URI
        let mut broken = Asset::article();
        broken.set_metadata("title", "Broken").unwrap();
        broken.set_metadata("body", "<p>x</p>").unwrap();
        let broken_id = broken.id().clone();
        hatch.save_asset(broken).unwrap();
        hatch.finish().await.unwrap();

        let report = audit_hatch(tmp.path()).await.unwrap();
        assert!(report.is_clean(), "{:?}", report.problems);
        assert_eq!(report.name, "audit");
        assert_eq!(report.entries, 2);
        assert_eq!(report.error_records.len(), 1);
        assert_eq!(report.error_records[0].asset_id, broken_id.as_str());
    }

    #[tokio::test]
    async fn test_audit_reports_tampered_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let mut hatch = Hatch::new(HatchConfig::new("audit", tmp.path()))
            .await
            .unwrap();
        let asset = article(0);
        let id = asset.id().clone();
        hatch.save_asset(asset).unwrap();
        hatch.finish().await.unwrap();

        let path = tmp.path().join(id.metadata_filename());
        let mut record: Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        record.remove("document");
        std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        let report = audit_hatch(tmp.path()).await.unwrap();
        assert!(!report.is_clean());
        assert!(report.problems[0].contains("document"));
    }

    #[tokio::test]
    async fn test_audit_without_manifest_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(audit_hatch(tmp.path()).await.is_err());
    }
}
