//! Shape checks for metadata records and manifest entries.
//!
//! Both functions are pure: they inspect a record and either accept it or
//! return a [`VerificationError`] naming the first offending field.

use crate::error::VerificationError;
use crate::models::ObjectType;
use crate::outputs::manifest::ManifestEntry;
use crate::utils::is_asset_id;
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

/// Titles longer than this are accepted but logged.
pub const MAX_TITLE_CHARS: usize = 140;

/// Check a metadata record against the rules for its `objectType`.
///
/// Every record needs `assetID`, `canonicalURI`, `matchingLinks`, `tags`, and
/// `revisionTag`. Videos must not carry `contentType`; every other type must.
/// Articles need `title` and `document`, images `cdnFilename`, dictionary
/// words `word` and `definition`.
pub fn verify_metadata(record: &Map<String, Value>) -> Result<(), VerificationError> {
    let id = record
        .get("assetID")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>");
    let fail = |field: &str, problem: &str| Err(VerificationError::new(id, field, problem));

    match record.get("assetID").and_then(Value::as_str) {
        Some(s) if is_asset_id(s) => {}
        _ => return fail("assetID", "must be a 40 character hex string"),
    }
    if !is_string(record, "canonicalURI") {
        return fail("canonicalURI", "must be a string");
    }
    match string_array(record, "matchingLinks") {
        Some(links) if !links.is_empty() => {}
        _ => return fail("matchingLinks", "must be a non-empty array of strings"),
    }
    if string_array(record, "tags").is_none() {
        return fail("tags", "must be an array of strings");
    }
    if non_empty_str(record, "revisionTag").is_none() {
        return fail("revisionTag", "must be a non-empty string");
    }

    let object_type = match record.get("objectType").and_then(Value::as_str) {
        Some(tag) => match ObjectType::from_tag(tag) {
            Some(t) => t,
            None => return fail("objectType", "is not a supported object type"),
        },
        None => return fail("objectType", "must be a string"),
    };

    if object_type == ObjectType::Video {
        if record.get("contentType").is_some_and(|v| !v.is_null()) {
            return fail("contentType", "must not be set on a video before ingestion");
        }
    } else if !is_string(record, "contentType") {
        return fail("contentType", "must be a string");
    }

    match object_type {
        ObjectType::Article => {
            let Some(title) = non_empty_str(record, "title") else {
                return fail("title", "must be a non-empty string");
            };
            let chars = title.chars().count();
            if chars > MAX_TITLE_CHARS {
                warn!(asset_id = %id, chars, max = MAX_TITLE_CHARS, "Article title is unusually long");
            }
            if non_empty_str(record, "document").is_none() {
                return fail("document", "must be a non-empty string");
            }
        }
        ObjectType::Image => {
            if non_empty_str(record, "cdnFilename").is_none() {
                return fail("cdnFilename", "must be set; the image payload was never written");
            }
        }
        ObjectType::DictionaryWord => {
            if non_empty_str(record, "word").is_none() {
                return fail("word", "must be a non-empty string");
            }
            if non_empty_str(record, "definition").is_none() {
                return fail("definition", "must be a non-empty string");
            }
        }
        ObjectType::Video | ObjectType::Document => {}
    }
    Ok(())
}

/// Check that a manifest entry's URI is usable. `data:` URIs are accepted as is.
pub fn verify_manifest_entry(entry: &ManifestEntry) -> Result<(), VerificationError> {
    let Some(uri) = entry.uri.as_deref() else {
        return Ok(());
    };
    if uri.starts_with("data:") {
        return Ok(());
    }
    Url::parse(uri)
        .map(|_| ())
        .map_err(|e| VerificationError::new(entry.id.as_str(), "uri", format!("is not a valid URL: {e}")))
}

fn is_string(record: &Map<String, Value>, key: &str) -> bool {
    record.get(key).is_some_and(Value::is_string)
}

fn non_empty_str<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn string_array<'a>(record: &'a Map<String, Value>, key: &str) -> Option<Vec<&'a str>> {
    record
        .get(key)?
        .as_array()?
        .iter()
        .map(Value::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Asset, AssetId};
    use serde_json::json;

    fn base(asset: &mut Asset) {
        asset
            .set_metadata("canonicalURI", "https://example.com/item")
            .unwrap();
        asset.set_metadata("tags", vec!["news"]).unwrap();
    }

    fn complete_records() -> Vec<(ObjectType, Map<String, Value>, Vec<&'static str>)> {
        let mut article = Asset::article();
        base(&mut article);
        article.set_metadata("title", "Headline").unwrap();
        article.set_metadata("body", "<p>Text</p>").unwrap();
        article.render().unwrap();

        let mut image = Asset::image();
        base(&mut image);
        image.set_metadata("contentType", "image/jpeg").unwrap();
        image.set_payload(vec![0xff, 0xd8]);

        let mut video = Asset::video();
        base(&mut video);

        let mut word = Asset::dictionary_word();
        base(&mut word);
        word.set_metadata("word", "hatch").unwrap();
        word.set_metadata("definition", "a batch of ingested assets").unwrap();

        let mut document = Asset::document();
        base(&mut document);
        document.set_metadata("contentType", "application/pdf").unwrap();

        let common = vec!["assetID", "canonicalURI", "matchingLinks", "tags", "revisionTag"];
        let with = |extra: &[&'static str]| {
            let mut fields = common.clone();
            fields.extend_from_slice(extra);
            fields
        };
        vec![
            (
                ObjectType::Article,
                article.to_metadata_record(),
                with(&["contentType", "title", "document"]),
            ),
            (
                ObjectType::Image,
                image.to_metadata_record(),
                with(&["contentType", "cdnFilename"]),
            ),
            (ObjectType::Video, video.to_metadata_record(), with(&[])),
            (
                ObjectType::DictionaryWord,
                word.to_metadata_record(),
                with(&["contentType", "word", "definition"]),
            ),
            (
                ObjectType::Document,
                document.to_metadata_record(),
                with(&["contentType"]),
            ),
        ]
    }

    #[test]
    fn test_complete_records_verify() {
        for (object_type, record, _) in complete_records() {
            assert!(
                verify_metadata(&record).is_ok(),
                "{object_type} record should verify: {record:?}"
            );
        }
    }

    #[test]
    fn test_removing_mandatory_field_names_it() {
        for (object_type, record, mandatory) in complete_records() {
            for field in mandatory {
                let mut broken = record.clone();
                broken.remove(field);
                let err = verify_metadata(&broken)
                    .expect_err(&format!("{object_type} without {field} should fail"));
                assert_eq!(err.field, field, "{object_type}");
            }
        }
    }

    #[test]
    fn test_video_with_content_type_fails() {
        let (_, mut record, _) = complete_records().remove(2);
        record.insert("contentType".into(), json!("video/mp4"));
        let err = verify_metadata(&record).unwrap_err();
        assert_eq!(err.field, "contentType");
    }

    #[test]
    fn test_unknown_object_type_fails() {
        let (_, mut record, _) = complete_records().remove(4);
        record.insert("objectType".into(), json!("SetObject"));
        let err = verify_metadata(&record).unwrap_err();
        assert_eq!(err.field, "objectType");
    }

    #[test]
    fn test_empty_matching_links_fail() {
        let (_, mut record, _) = complete_records().remove(4);
        record.insert("matchingLinks".into(), json!([]));
        assert_eq!(verify_metadata(&record).unwrap_err().field, "matchingLinks");
    }

    #[test]
    fn test_null_canonical_uri_fails() {
        let (_, mut record, _) = complete_records().remove(4);
        record.insert("canonicalURI".into(), Value::Null);
        assert_eq!(verify_metadata(&record).unwrap_err().field, "canonicalURI");
    }

    #[test]
    fn test_long_title_only_warns() {
        let (_, mut record, _) = complete_records().remove(0);
        record.insert("title".into(), json!("x".repeat(MAX_TITLE_CHARS + 10)));
        assert!(verify_metadata(&record).is_ok());
    }

    #[test]
    fn test_short_asset_id_fails() {
        let (_, mut record, _) = complete_records().remove(4);
        record.insert("assetID".into(), json!("abc123"));
        assert_eq!(verify_metadata(&record).unwrap_err().field, "assetID");
    }

    fn entry(uri: Option<&str>) -> ManifestEntry {
        ManifestEntry {
            id: AssetId::generate(),
            uri: uri.map(str::to_string),
            title: None,
            is_top_level: true,
        }
    }

    #[test]
    fn test_manifest_entry_uris() {
        assert!(verify_manifest_entry(&entry(Some("https://example.com/a"))).is_ok());
        assert!(verify_manifest_entry(&entry(Some("data:image/png;base64,AAAA"))).is_ok());
        assert!(verify_manifest_entry(&entry(None)).is_ok());
        let err = verify_manifest_entry(&entry(Some("not a url"))).unwrap_err();
        assert_eq!(err.field, "uri");
    }
}
