//! Per-asset persistence.
//!
//! [`persist`] resolves an asset's payload, verifies its metadata record, and
//! writes `<id>.data` (when there is a payload) followed by `<id>.metadata`.
//! Any failure is logged and recorded in `<id>.errors` for post-mortem
//! inspection, then returned to the caller, which marks the asset failed.
//! Nothing here aborts the run.

use crate::error::PersistError;
use crate::models::{Asset, AssetId, ObjectType};
use crate::storage::Storage;
use crate::utils::truncate_for_log;
use crate::verify::verify_metadata;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

/// Persist one asset into `storage`.
#[instrument(level = "info", skip_all, fields(asset_id = %asset.id(), object_type = %asset.object_type()))]
pub async fn persist(mut asset: Asset, storage: &dyn Storage) -> Result<(), PersistError> {
    let result = write_asset(&mut asset, storage).await;
    match &result {
        Ok(()) => info!("Persisted asset"),
        Err(e) => {
            warn!(error = %truncate_for_log(&e.to_string(), 300), "Asset failed to persist");
            record_failure(asset.id(), asset.object_type(), e, storage).await;
        }
    }
    result
}

async fn write_asset(asset: &mut Asset, storage: &dyn Storage) -> Result<(), PersistError> {
    asset
        .resolve_payload()
        .await
        .map_err(PersistError::Payload)?;
    if !asset.is_rendered() {
        asset.render()?;
    }

    let record = asset.to_metadata_record();
    verify_metadata(&record)?;

    if let Some(bytes) = asset.payload() {
        storage
            .write_file(&asset.id().data_filename(), bytes)
            .await?;
    }
    storage
        .write_json(&asset.id().metadata_filename(), &Value::Object(record))
        .await?;
    Ok(())
}

/// Best effort: a failure to write the error record is only logged.
///
/// Takes the id rather than the asset: `Asset` is `Send` but not `Sync`, so a
/// borrow of it cannot be held across an await inside a spawned task.
async fn record_failure(
    id: &AssetId,
    object_type: ObjectType,
    error: &PersistError,
    storage: &dyn Storage,
) {
    let report = json!({
        "assetID": id,
        "objectType": object_type.tag(),
        "error": error.to_string(),
        "failedAt": Utc::now().to_rfc3339(),
    });
    if let Err(e) = storage
        .write_json(&id.errors_filename(), &report)
        .await
    {
        debug!(error = %e, "Could not write error record");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{BoxError, StorageError};
    use crate::storage::FsStorage;
    use async_trait::async_trait;
    use std::io;

    /// Storage whose writes always fail.
    #[derive(Debug)]
    pub(crate) struct BrokenStorage;

    #[async_trait]
    impl Storage for BrokenStorage {
        async fn write_file(&self, _name: &str, _bytes: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Io(io::Error::other("disk full")))
        }
    }

    fn image_with_payload() -> Asset {
        let mut image = Asset::image();
        image
            .set_metadata("canonicalURI", "https://example.com/cat.png")
            .unwrap();
        image.set_metadata("contentType", "image/png").unwrap();
        image.set_payload(b"\x89PNG".to_vec());
        image
    }

    #[tokio::test]
    async fn test_persist_writes_metadata_and_data() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path());
        let image = image_with_payload();
        let id = image.id().clone();

        persist(image, &storage).await.unwrap();

        let data = std::fs::read(tmp.path().join(id.data_filename())).unwrap();
        assert_eq!(data, b"\x89PNG");
        let raw = std::fs::read_to_string(tmp.path().join(id.metadata_filename())).unwrap();
        let record: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(record["assetID"], id.as_str());
        assert_eq!(record["cdnFilename"], id.data_filename());
        assert!(!tmp.path().join(id.errors_filename()).exists());
    }

    #[tokio::test]
    async fn test_persist_renders_articles_without_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path());
        let mut article = Asset::article();
        article
            .set_metadata("canonicalURI", "https://example.com/story")
            .unwrap();
        article.set_metadata("title", "Story").unwrap();
        article.set_metadata("body", "<p>Once</p>").unwrap();
        let id = article.id().clone();

        persist(article, &storage).await.unwrap();

        assert!(tmp.path().join(id.metadata_filename()).exists());
        assert!(!tmp.path().join(id.data_filename()).exists());
    }

    #[tokio::test]
    async fn test_verification_failure_is_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path());
        // no canonical URI at all
        let mut bare = Asset::image();
        bare.set_metadata("contentType", "image/png").unwrap();
        bare.set_payload(vec![1]);
        let id = bare.id().clone();

        let err = persist(bare, &storage).await.unwrap_err();
        assert!(matches!(err, PersistError::Verification(ref v) if v.field == "canonicalURI"));
        assert!(!tmp.path().join(id.metadata_filename()).exists());
        assert!(!tmp.path().join(id.data_filename()).exists());

        let raw = std::fs::read_to_string(tmp.path().join(id.errors_filename())).unwrap();
        let report: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(report["objectType"], "ImageObject");
        assert!(report["error"].as_str().unwrap().contains("canonicalURI"));
    }

    #[tokio::test]
    async fn test_payload_failure_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path());
        let mut doc = Asset::document();
        doc.set_metadata("canonicalURI", "https://example.com/a.pdf")
            .unwrap();
        doc.set_metadata("contentType", "application/pdf").unwrap();
        doc.set_payload_future(async { Err::<Vec<u8>, BoxError>("404".into()) });

        let err = persist(doc, &storage).await.unwrap_err();
        assert!(matches!(err, PersistError::Payload(_)));
    }

    #[tokio::test]
    async fn test_unrenderable_article_fails_locally() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path());
        let mut article = Asset::article();
        article
            .set_metadata("canonicalURI", "https://example.com/story")
            .unwrap();

        let err = persist(article, &storage).await.unwrap_err();
        assert!(matches!(err, PersistError::Render(_)));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_persist_future_is_send_with_pending_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path());
        let mut image = image_with_payload();
        image.set_payload_future(async { Err::<Vec<u8>, BoxError>("timeout".into()) });
        let id = image.id().clone();

        let fut = persist(image, &storage);
        assert_send(&fut);
        assert!(fut.await.is_err());
        assert!(tmp.path().join(id.errors_filename()).exists());
    }

    #[tokio::test]
    async fn test_storage_failure_is_returned() {
        let err = persist(image_with_payload(), &BrokenStorage)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::Storage(_)));
    }
}
