//! Command-line interface definitions for libingester.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Directory arguments can also be provided via environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the libingester hatch tool.
///
/// # Examples
///
/// ```sh
/// # Re-verify a hatch written by an ingestion run
/// libingester verify -d ./hatch_daily_20250506T080000
///
/// # Bundle it into ./hatch_daily_20250506T080000.tar.gz
/// libingester archive -d ./hatch_daily_20250506T080000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Re-verify the manifest and metadata of a persisted hatch
    Verify {
        /// Hatch directory containing hatch_manifest.json
        #[arg(short = 'd', long, env = "HATCH_DIR")]
        hatch_dir: PathBuf,
    },
    /// Bundle a hatch directory into <dir>.tar.gz (requires the `archive` feature)
    Archive {
        /// Hatch directory to bundle
        #[arg(short = 'd', long, env = "HATCH_DIR")]
        hatch_dir: PathBuf,
    },
}
