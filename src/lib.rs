//! # libingester
//!
//! Assembles scraped articles, images, videos, documents, and dictionary
//! entries into a *hatch*: a directory of verified metadata records, payload
//! files, and a manifest that downstream consumers index.
//!
//! ## Architecture
//!
//! 1. **Production**: Scrapers build [`Asset`]s and hand them to a [`Hatch`]
//!    as they complete, in any order
//! 2. **Persistence**: Each asset is verified and written in the background,
//!    keyed by its id; failures are isolated to that asset
//! 3. **Pruning**: [`Hatch::finish`] waits for every write, then drops assets
//!    that failed or depend on a failure, along with their siblings
//! 4. **Commit**: If the failure rate and referential integrity checks pass,
//!    `hatch_manifest.json` is written and the hatch is optionally archived
//!
//! ## Usage
//!
//! ```no_run
//! use libingester::{Asset, Hatch, HatchConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut hatch = Hatch::new(HatchConfig::new("daily", "./hatch_daily")).await?;
//!
//! let mut thumbnail = Asset::image();
//! thumbnail.set_metadata("canonicalURI", "https://example.com/cat.png")?;
//! thumbnail.set_metadata("contentType", "image/png")?;
//! thumbnail.set_payload(vec![0x89, b'P', b'N', b'G']);
//!
//! let mut article = Asset::article();
//! article.set_metadata("canonicalURI", "https://example.com/cats")?;
//! article.set_metadata("title", "Cats")?;
//! article.set_metadata("body", "<p>Cats are great.</p>")?;
//! article.set_thumbnail(&thumbnail)?;
//!
//! hatch.save_asset(thumbnail)?;
//! hatch.save_asset(article)?;
//! let report = hatch.finish().await?;
//! println!("{} assets in manifest", report.manifest.len());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod graph;
pub mod hatch;
pub mod models;
pub mod outputs;
pub mod persist;
pub mod storage;
pub mod utils;
pub mod verify;

pub use config::HatchConfig;
pub use error::{AssetError, HatchError, PersistError, StorageError, VerificationError};
pub use hatch::{Hatch, HatchReport, HatchState};
pub use models::{Asset, AssetId, AssetKind, MetadataValue, ObjectType};
pub use outputs::manifest::{Manifest, ManifestEntry};
pub use storage::{FsStorage, Storage};
