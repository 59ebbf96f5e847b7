//! Checksum manifests (`SHA256SUMS` / `checksums.txt`).
//!
//! One record per line: `<hex-digest><whitespace><filename>`.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// A parsed checksum manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: Vec<ChecksumEntry>,
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    /// Hex digest as published.
    pub digest: String,
    /// File the digest belongs to.
    pub file_name: String,
}

impl ChecksumManifest {
    /// Parse manifest text. Lines without a file name are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let line = line.trim_end();
                let (digest, rest) = line.split_once(char::is_whitespace)?;
                let file_name = rest.trim_start();
                if digest.is_empty() || file_name.is_empty() {
                    return None;
                }
                Some(ChecksumEntry {
                    digest: digest.to_string(),
                    file_name: file_name.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Digest for `file_name`; the first matching line wins.
    #[must_use]
    pub fn digest_for(&self, file_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.file_name == file_name)
            .map(|entry| entry.digest.as_str())
    }

    /// All parsed records, in manifest order.
    #[must_use]
    pub fn entries(&self) -> &[ChecksumEntry] {
        &self.entries
    }
}

/// Look up the digest published for `file_name` in `manifest`.
#[must_use]
pub fn extract_checksum(manifest: &str, file_name: &str) -> Option<String> {
    ChecksumManifest::parse(manifest)
        .digest_for(file_name)
        .map(str::to_string)
}

/// SHA-256 of a file, lowercase hex.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Check `path` against the digest the manifest lists for `asset`.
///
/// # Errors
///
/// Returns [`Error::ChecksumNotFound`] when the manifest has no entry for
/// `asset`, and [`Error::ChecksumMismatch`] when the digests differ.
pub fn verify_file(path: &Path, manifest: &ChecksumManifest, asset: &str) -> Result<()> {
    let expected = manifest
        .digest_for(asset)
        .ok_or_else(|| Error::ChecksumNotFound(asset.to_string()))?;

    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            asset: asset.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
