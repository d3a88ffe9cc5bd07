//! # libingester
//!
//! Command-line companion to the libingester library. Ingestion runs build
//! hatches through [`libingester::Hatch`]; this binary inspects and packages
//! the directories they leave behind.
//!
//! ## Usage
//!
//! ```sh
//! libingester verify -d ./hatch_daily_20250506T080000
//! libingester archive -d ./hatch_daily_20250506T080000
//! ```

use clap::Parser;
use libingester::audit::audit_hatch;
use libingester::outputs::archive::archive_dir;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{Cli, Command};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    match args.command {
        Command::Verify { hatch_dir } => {
            let report = audit_hatch(&hatch_dir).await?;
            for record in &report.error_records {
                warn!(asset_id = %record.asset_id, error = %record.error, "Asset dropped during ingestion");
            }
            for problem in &report.problems {
                error!(%problem, "Verification problem");
            }
            info!(
                name = %report.name,
                entries = report.entries,
                dropped = report.error_records.len(),
                problems = report.problems.len(),
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "Audit finished"
            );
            if !report.is_clean() {
                return Err(format!(
                    "hatch {} failed verification with {} problem(s)",
                    hatch_dir.display(),
                    report.problems.len()
                )
                .into());
            }
        }
        Command::Archive { hatch_dir } => match archive_dir(&hatch_dir).await? {
            Some(path) => info!(archive = %path.display(), "Hatch archived"),
            None => return Err("this build was compiled without the `archive` feature".into()),
        },
    }

    Ok(())
}
