//! Data models for ingested assets.
//!
//! This module defines the nodes of a hatch:
//! - [`AssetId`]: Random, hex-encoded identity used for file names and graph edges
//! - [`ObjectType`]: The closed set of supported object types
//! - [`AssetKind`]: One strongly-typed field struct per object type
//! - [`Asset`]: Identity, shared metadata, payload, and outgoing dependency edges
//!
//! Assets do not hold references to each other. A child is recorded by id only,
//! and the [`Hatch`](crate::hatch::Hatch) keeps the id-indexed table that the
//! graph functions in [`crate::graph`] operate on.

use crate::error::{AssetError, BoxError};
use crate::utils::{html_escape, random_hex_id};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::future::Future;

/// Opaque unique identifier of an asset: 160 random bits as 40 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(random_hex_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the verified metadata record.
    pub fn metadata_filename(&self) -> String {
        format!("{}.metadata", self.0)
    }

    /// File name of the raw payload.
    pub fn data_filename(&self) -> String {
        format!("{}.data", self.0)
    }

    /// File name of the post-mortem error record.
    pub fn errors_filename(&self) -> String {
        format!("{}.errors", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object type tag carried in every metadata record as `objectType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "ArticleObject")]
    Article,
    #[serde(rename = "ImageObject")]
    Image,
    #[serde(rename = "VideoObject")]
    Video,
    #[serde(rename = "DictionaryWordObject")]
    DictionaryWord,
    #[serde(rename = "DocumentObject")]
    Document,
}

impl ObjectType {
    pub const ALL: [ObjectType; 5] = [
        ObjectType::Article,
        ObjectType::Image,
        ObjectType::Video,
        ObjectType::DictionaryWord,
        ObjectType::Document,
    ];

    /// The persisted `objectType` tag.
    pub fn tag(self) -> &'static str {
        match self {
            ObjectType::Article => "ArticleObject",
            ObjectType::Image => "ImageObject",
            ObjectType::Video => "VideoObject",
            ObjectType::DictionaryWord => "DictionaryWordObject",
            ObjectType::Document => "DocumentObject",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A value accepted by [`Asset::set_metadata`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
    Date(DateTime<Utc>),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        MetadataValue::List(value)
    }
}

impl From<Vec<&str>> for MetadataValue {
    fn from(value: Vec<&str>) -> Self {
        MetadataValue::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(value: DateTime<Utc>) -> Self {
        MetadataValue::Date(value)
    }
}

impl MetadataValue {
    fn into_text(self, key: &str) -> Result<String, AssetError> {
        match self {
            MetadataValue::Text(s) => Ok(s),
            _ => Err(wrong_type(key, "a string")),
        }
    }

    fn into_list(self, key: &str) -> Result<Vec<String>, AssetError> {
        match self {
            MetadataValue::List(v) => Ok(v),
            _ => Err(wrong_type(key, "a list of strings")),
        }
    }

    /// Dates may also be given as RFC 3339 text.
    fn into_date(self, key: &str) -> Result<DateTime<Utc>, AssetError> {
        match self {
            MetadataValue::Date(d) => Ok(d),
            MetadataValue::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| wrong_type(key, "an RFC 3339 date")),
            MetadataValue::List(_) => Err(wrong_type(key, "a date")),
        }
    }
}

fn wrong_type(key: &str, expected: &'static str) -> AssetError {
    AssetError::WrongValueType {
        key: key.to_string(),
        expected,
    }
}

/// Metadata shared by every object type.
#[derive(Debug, Clone, Default)]
pub struct CommonMetadata {
    pub canonical_uri: Option<String>,
    pub tags: Vec<String>,
    pub title: Option<String>,
    pub synopsis: Option<String>,
    pub license: Option<String>,
    pub last_modified_date: Option<DateTime<Utc>>,
}

/// A news article or blog post. Rendered into an HTML `document`.
#[derive(Debug, Clone, Default)]
pub struct ArticleFields {
    /// HTML body fragment.
    pub body: Option<String>,
    /// Full HTML document, set by [`Asset::render`].
    pub document: Option<String>,
    pub authors: Vec<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub source_name: Option<String>,
    pub thumbnail: Option<AssetId>,
}

#[derive(Debug, Clone, Default)]
pub struct ImageFields {
    pub content_type: Option<String>,
    pub caption: Option<String>,
    pub thumbnail: Option<AssetId>,
}

/// Videos never carry a content type; it is resolved out of band after ingestion.
#[derive(Debug, Clone, Default)]
pub struct VideoFields {
    pub download_uri: Option<String>,
    pub thumbnail: Option<AssetId>,
}

#[derive(Debug, Clone, Default)]
pub struct DictionaryWordFields {
    pub word: Option<String>,
    pub definition: Option<String>,
    pub part_of_speech: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFields {
    pub content_type: Option<String>,
    pub authors: Vec<String>,
    pub published_date: Option<DateTime<Utc>>,
}

/// Per-type fields. The variant decides which metadata keys are accepted and
/// which are mandatory at verification time.
#[derive(Debug, Clone)]
pub enum AssetKind {
    Article(ArticleFields),
    Image(ImageFields),
    Video(VideoFields),
    DictionaryWord(DictionaryWordFields),
    Document(DocumentFields),
}

impl AssetKind {
    pub fn object_type(&self) -> ObjectType {
        match self {
            AssetKind::Article(_) => ObjectType::Article,
            AssetKind::Image(_) => ObjectType::Image,
            AssetKind::Video(_) => ObjectType::Video,
            AssetKind::DictionaryWord(_) => ObjectType::DictionaryWord,
            AssetKind::Document(_) => ObjectType::Document,
        }
    }

    fn thumbnail(&self) -> Option<&AssetId> {
        match self {
            AssetKind::Article(f) => f.thumbnail.as_ref(),
            AssetKind::Image(f) => f.thumbnail.as_ref(),
            AssetKind::Video(f) => f.thumbnail.as_ref(),
            AssetKind::DictionaryWord(_) | AssetKind::Document(_) => None,
        }
    }
}

enum Payload {
    Empty,
    Ready(Vec<u8>),
    Pending(BoxFuture<'static, Result<Vec<u8>, BoxError>>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Ready(bytes) => write!(f, "Ready({} bytes)", bytes.len()),
            Payload::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A single ingested unit and a node in the hatch's dependency graph.
#[derive(Debug)]
pub struct Asset {
    id: AssetId,
    kind: AssetKind,
    common: CommonMetadata,
    payload: Payload,
    children: Vec<AssetId>,
    failed: bool,
    created_at: DateTime<Utc>,
}

impl Asset {
    /// Create an asset with a freshly generated id.
    pub fn new(kind: AssetKind) -> Self {
        Self {
            id: AssetId::generate(),
            kind,
            common: CommonMetadata::default(),
            payload: Payload::Empty,
            children: Vec::new(),
            failed: false,
            created_at: Utc::now(),
        }
    }

    pub fn article() -> Self {
        Self::new(AssetKind::Article(ArticleFields::default()))
    }

    pub fn image() -> Self {
        Self::new(AssetKind::Image(ImageFields::default()))
    }

    pub fn video() -> Self {
        Self::new(AssetKind::Video(VideoFields::default()))
    }

    pub fn dictionary_word() -> Self {
        Self::new(AssetKind::DictionaryWord(DictionaryWordFields::default()))
    }

    pub fn document() -> Self {
        Self::new(AssetKind::Document(DocumentFields::default()))
    }

    pub fn id(&self) -> &AssetId {
        &self.id
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    pub fn kind(&self) -> &AssetKind {
        &self.kind
    }

    pub fn common(&self) -> &CommonMetadata {
        &self.common
    }

    pub fn title(&self) -> Option<&str> {
        self.common.title.as_deref()
    }

    pub fn canonical_uri(&self) -> Option<&str> {
        self.common.canonical_uri.as_deref()
    }

    /// Set a metadata field by its record name (e.g. `"canonicalURI"`, `"tags"`).
    ///
    /// Fails with [`AssetError::UnknownField`] if the key is not part of this
    /// object type's field set. Computed fields (`assetID`, `revisionTag`,
    /// `matchingLinks`, `cdnFilename`, `document`) are never settable.
    pub fn set_metadata(
        &mut self,
        key: &str,
        value: impl Into<MetadataValue>,
    ) -> Result<(), AssetError> {
        let value = value.into();
        let common = &mut self.common;
        match key {
            "canonicalURI" => common.canonical_uri = Some(value.into_text(key)?),
            "tags" => common.tags = value.into_list(key)?,
            "title" => common.title = Some(value.into_text(key)?),
            "synopsis" => common.synopsis = Some(value.into_text(key)?),
            "license" => common.license = Some(value.into_text(key)?),
            "lastModifiedDate" => common.last_modified_date = Some(value.into_date(key)?),
            _ => return self.set_kind_metadata(key, value),
        }
        Ok(())
    }

    fn set_kind_metadata(&mut self, key: &str, value: MetadataValue) -> Result<(), AssetError> {
        let object_type = self.object_type();
        match (&mut self.kind, key) {
            (AssetKind::Article(f), "body") => f.body = Some(value.into_text(key)?),
            (AssetKind::Article(f), "authors") => f.authors = value.into_list(key)?,
            (AssetKind::Article(f), "publishedDate") => {
                f.published_date = Some(value.into_date(key)?)
            }
            (AssetKind::Article(f), "sourceName") => f.source_name = Some(value.into_text(key)?),
            (AssetKind::Image(f), "contentType") => f.content_type = Some(value.into_text(key)?),
            (AssetKind::Image(f), "caption") => f.caption = Some(value.into_text(key)?),
            (AssetKind::Video(f), "downloadURI") => f.download_uri = Some(value.into_text(key)?),
            (AssetKind::DictionaryWord(f), "word") => f.word = Some(value.into_text(key)?),
            (AssetKind::DictionaryWord(f), "definition") => {
                f.definition = Some(value.into_text(key)?)
            }
            (AssetKind::DictionaryWord(f), "partOfSpeech") => {
                f.part_of_speech = Some(value.into_text(key)?)
            }
            (AssetKind::Document(f), "contentType") => {
                f.content_type = Some(value.into_text(key)?)
            }
            (AssetKind::Document(f), "authors") => f.authors = value.into_list(key)?,
            (AssetKind::Document(f), "publishedDate") => {
                f.published_date = Some(value.into_date(key)?)
            }
            _ => {
                return Err(AssetError::UnknownField {
                    object_type,
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Point this asset's thumbnail at another asset, making it a dependent.
    pub fn set_thumbnail(&mut self, thumbnail: &Asset) -> Result<(), AssetError> {
        let object_type = self.object_type();
        let id = Some(thumbnail.id.clone());
        match &mut self.kind {
            AssetKind::Article(f) => f.thumbnail = id,
            AssetKind::Image(f) => f.thumbnail = id,
            AssetKind::Video(f) => f.thumbnail = id,
            AssetKind::DictionaryWord(_) | AssetKind::Document(_) => {
                return Err(AssetError::UnknownField {
                    object_type,
                    key: "thumbnail".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Record `child` as a dependency. Duplicates are kept.
    pub fn add_child(&mut self, child: &Asset) {
        self.children.push(child.id.clone());
    }

    pub fn children(&self) -> &[AssetId] {
        &self.children
    }

    /// Every asset id this asset depends on: children in insertion order,
    /// followed by the thumbnail if it is not already a child.
    pub fn get_dependent_asset_ids(&self) -> Vec<AssetId> {
        self.children
            .iter()
            .chain(self.kind.thumbnail())
            .unique()
            .cloned()
            .collect()
    }

    pub fn set_payload(&mut self, bytes: impl Into<Vec<u8>>) {
        self.payload = Payload::Ready(bytes.into());
    }

    /// Attach a payload that is still being produced. It is awaited by the
    /// persister before anything is written.
    pub fn set_payload_future<F>(&mut self, future: F)
    where
        F: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
    {
        self.payload = Payload::Pending(Box::pin(future));
    }

    /// Await a pending payload. A no-op for empty or ready payloads.
    pub async fn resolve_payload(&mut self) -> Result<(), BoxError> {
        match std::mem::replace(&mut self.payload, Payload::Empty) {
            Payload::Pending(future) => self.payload = Payload::Ready(future.await?),
            other => self.payload = other,
        }
        Ok(())
    }

    /// Resolved payload bytes, if any.
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Ready(bytes) => Some(bytes),
            Payload::Empty | Payload::Pending(_) => None,
        }
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// MIME type of the payload or document. Always `None` for videos.
    pub fn content_type(&self) -> Option<&str> {
        match &self.kind {
            AssetKind::Article(_) | AssetKind::DictionaryWord(_) => Some("text/html"),
            AssetKind::Image(f) => f.content_type.as_deref(),
            AssetKind::Document(f) => f.content_type.as_deref(),
            AssetKind::Video(_) => None,
        }
    }

    /// Last-modified date when known, otherwise the construction timestamp.
    pub fn revision_tag(&self) -> String {
        self.common
            .last_modified_date
            .unwrap_or(self.created_at)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn matching_links(&self) -> Vec<String> {
        self.common.canonical_uri.iter().cloned().collect()
    }

    pub fn is_rendered(&self) -> bool {
        match &self.kind {
            AssetKind::Article(f) => f.document.is_some(),
            _ => true,
        }
    }

    /// Build the article's HTML document from its title and body.
    ///
    /// Other object types have nothing to render.
    pub fn render(&mut self) -> Result<(), AssetError> {
        let AssetKind::Article(fields) = &mut self.kind else {
            return Ok(());
        };
        let title = self
            .common
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AssetError::MissingField {
                object_type: ObjectType::Article,
                field: "title",
            })?;
        let body = fields.body.as_deref().ok_or(AssetError::MissingField {
            object_type: ObjectType::Article,
            field: "body",
        })?;
        fields.document = Some(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
            html_escape(title),
            body
        ));
        Ok(())
    }

    /// Flatten the asset into the record persisted as `<id>.metadata`.
    ///
    /// `canonicalURI` and `tags` are always present. `cdnFilename` is only
    /// emitted for images whose payload has been resolved.
    pub fn to_metadata_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("assetID".into(), json!(self.id));
        record.insert("objectType".into(), json!(self.object_type().tag()));
        record.insert("canonicalURI".into(), json!(self.common.canonical_uri));
        record.insert("matchingLinks".into(), json!(self.matching_links()));
        record.insert("tags".into(), json!(self.common.tags));
        record.insert("revisionTag".into(), json!(self.revision_tag()));
        if let Some(content_type) = self.content_type() {
            record.insert("contentType".into(), json!(content_type));
        }

        let common = &self.common;
        insert_opt(&mut record, "title", common.title.as_ref());
        insert_opt(&mut record, "synopsis", common.synopsis.as_ref());
        insert_opt(&mut record, "license", common.license.as_ref());
        insert_date(&mut record, "lastModifiedDate", common.last_modified_date);
        insert_opt(&mut record, "thumbnail", self.kind.thumbnail());

        match &self.kind {
            AssetKind::Article(f) => {
                insert_opt(&mut record, "document", f.document.as_ref());
                record.insert("authors".into(), json!(f.authors));
                insert_date(&mut record, "publishedDate", f.published_date);
                insert_opt(&mut record, "sourceName", f.source_name.as_ref());
            }
            AssetKind::Image(f) => {
                insert_opt(&mut record, "caption", f.caption.as_ref());
                if self.payload().is_some() {
                    record.insert("cdnFilename".into(), json!(self.id.data_filename()));
                }
            }
            AssetKind::Video(f) => {
                insert_opt(&mut record, "downloadURI", f.download_uri.as_ref());
            }
            AssetKind::DictionaryWord(f) => {
                insert_opt(&mut record, "word", f.word.as_ref());
                insert_opt(&mut record, "definition", f.definition.as_ref());
                insert_opt(&mut record, "partOfSpeech", f.part_of_speech.as_ref());
            }
            AssetKind::Document(f) => {
                record.insert("authors".into(), json!(f.authors));
                insert_date(&mut record, "publishedDate", f.published_date);
            }
        }
        record
    }
}

fn insert_opt<T: Serialize>(record: &mut Map<String, Value>, key: &str, value: Option<&T>) {
    if let Some(value) = value {
        record.insert(key.to_string(), json!(value));
    }
}

fn insert_date(record: &mut Map<String, Value>, key: &str, value: Option<DateTime<Utc>>) {
    if let Some(date) = value {
        record.insert(
            key.to_string(),
            json!(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
}
