//! Error types for hatch assembly.
//!
//! Errors fall into two groups:
//!
//! - **Local** errors ([`VerificationError`], [`StorageError`], [`PersistError`])
//!   never leave a single asset's persistence path. They turn that asset into a
//!   failed asset and the run continues.
//! - **Fatal** errors ([`HatchError`]) reject [`Hatch::finish`](crate::hatch::Hatch::finish)
//!   and leave no manifest on disk.
//!
//! [`AssetError`] is raised immediately by asset construction and mutation and
//! indicates a programming mistake by the producer.

use crate::models::ObjectType;
use std::io;
use thiserror::Error;

/// Boxed error returned by asynchronous payload producers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building or mutating an [`Asset`](crate::models::Asset).
#[derive(Debug, Error)]
pub enum AssetError {
    /// The metadata key is not recognized for this object type.
    #[error("{object_type} does not accept metadata field `{key}`")]
    UnknownField { object_type: ObjectType, key: String },

    /// The key is recognized but the value has the wrong shape.
    #[error("metadata field `{key}` expects {expected}")]
    WrongValueType { key: String, expected: &'static str },

    /// A mandatory field was still unset when the asset was rendered.
    #[error("{object_type} cannot be rendered: `{field}` is not set")]
    MissingField {
        object_type: ObjectType,
        field: &'static str,
    },
}

/// A metadata record failed the shape rules for its object type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("asset {asset_id}: field `{field}` {problem}")]
pub struct VerificationError {
    /// `assetID` of the offending record, or `"<unknown>"` when absent.
    pub asset_id: String,
    /// Name of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub problem: String,
}

impl VerificationError {
    pub(crate) fn new(asset_id: &str, field: &str, problem: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            field: field.to_string(),
            problem: problem.into(),
        }
    }
}

/// Error type for storage backend operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),
}

/// Why a single asset could not be persisted.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("payload production failed: {0}")]
    Payload(BoxError),

    #[error("render failed: {0}")]
    Render(#[from] AssetError),

    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Fatal errors that reject a hatch run.
#[derive(Debug, Error)]
pub enum HatchError {
    /// Dangling dependency reference or malformed manifest entry.
    #[error("hatch validation failed: {0}")]
    Validation(String),

    /// Too many submitted assets ended up failed.
    #[error("failure rate exceeded: {failed} of {total} assets failed")]
    FailureRateExceeded { failed: usize, total: usize },

    /// An operation was attempted in a state that does not allow it.
    #[error("hatch is {state} and cannot {operation}")]
    NotAccepting {
        state: &'static str,
        operation: &'static str,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("archive error: {0}")]
    Archive(String),
}

impl From<io::Error> for HatchError {
    fn from(err: io::Error) -> Self {
        HatchError::Storage(StorageError::Io(err))
    }
}
