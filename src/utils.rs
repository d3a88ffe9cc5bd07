//! Utility functions for id generation, string handling, and file system checks.
//!
//! This module provides helper functions used throughout the crate:
//! - Random asset id generation
//! - String truncation for logging and HTML escaping for rendered documents
//! - File system validation for hatch output directories

use once_cell::sync::Lazy;
use rand::{Rng, rng};
use regex::Regex;
use std::fs as stdfs;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Number of random bytes in an asset id (160 bits).
const ASSET_ID_BYTES: usize = 20;

static ASSET_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("asset id pattern is valid"));

/// Generate 160 random bits, hex-encoded to 40 lowercase characters.
pub fn random_hex_id() -> String {
    let mut bytes = [0u8; ASSET_ID_BYTES];
    rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Whether `s` has the shape of an asset id.
pub fn is_asset_id(s: &str) -> bool {
    ASSET_ID_RE.is_match(s)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) and get a
/// `"…(+N bytes)"` suffix.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Escape text for inclusion in HTML element content.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then creates and immediately
/// deletes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    // A small sync write keeps the error surface simple
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hex_id_shape() {
        let id = random_hex_id();
        assert_eq!(id.len(), 40);
        assert!(is_asset_id(&id));
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn test_is_asset_id_rejects_bad_shapes() {
        assert!(!is_asset_id("abc"));
        assert!(!is_asset_id(&"g".repeat(40)));
        assert!(!is_asset_id(&"a".repeat(41)));
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        let result = truncate_for_log("ééé", 3);
        assert_eq!(result, "é…(+4 bytes)");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("Fish & <Chips>"), "Fish &amp; &lt;Chips&gt;");
        assert_eq!(html_escape("plain"), "plain");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
