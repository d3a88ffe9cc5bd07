//! Output generation for a finished hatch.
//!
//! # Submodules
//!
//! - [`manifest`]: Writes and reads `hatch_manifest.json`
//! - [`archive`]: Bundles the hatch directory into `<root>.tar.gz`

pub mod archive;
pub mod manifest;
