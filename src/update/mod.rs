//! Self-update: check, verify, extract and install a release.
//!
//! This module handles:
//! - Comparing the running version against the latest GitHub release
//! - Verifying the release archive against its SHA-256 manifest
//! - Extracting the archive without letting entries escape the scratch dir
//! - Replacing the running binary with rollback on failure

pub mod archive;
pub mod cache;
pub mod checksum;
pub mod install;
mod release;
pub mod sanitize;
mod updater;
pub mod version;

pub use archive::extract_tar_gz;
pub use cache::{load_cache, save_cache, CachedCheck};
pub use checksum::{extract_checksum, ChecksumManifest};
pub use install::install_binary_to;
pub use release::{Fetcher, GitHubResolver, HttpFetcher, Platform, ReleaseInfo, ReleaseResolver};
pub use sanitize::sanitize_path;
pub use updater::Updater;
pub use version::{is_dev_build_version, is_newer, normalize_semver, ToolVersion};

use std::fmt;
use std::path::PathBuf;

/// A newer release that can be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    /// Version currently running.
    pub current_version: String,
    /// Latest published release.
    pub release: ReleaseInfo,
    /// Whether the running binary is a dev build.
    pub dev_build: bool,
}

impl UpdateInfo {
    /// Version the update installs.
    #[must_use]
    pub fn latest_version(&self) -> &str {
        &self.release.version
    }
}

/// Result of checking for an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The running version is the latest.
    UpToDate {
        /// Version currently running.
        current: String,
        /// Latest known release.
        latest: String,
    },
    /// The running binary is a dev build and the check was not forced.
    DevBuild {
        /// Version currently running.
        current: String,
        /// Latest known release.
        latest: String,
    },
    /// A newer release is available.
    Available(UpdateInfo),
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate { current, .. } => write!(f, "{current} is up to date"),
            Self::DevBuild { current, latest } => write!(
                f,
                "Running dev build {current}; latest release is {latest} (use --force to install it)"
            ),
            Self::Available(info) => write!(
                f,
                "Update available: {} -> {} ({}, {})",
                display_version(&info.current_version),
                info.release.version,
                info.release.asset_name,
                format_size(info.release.asset_size)
            ),
        }
    }
}

/// Result of a full update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The new binary is installed.
    Updated {
        /// Version that was running.
        from: String,
        /// Version now installed.
        to: String,
        /// Size of the downloaded archive.
        bytes: u64,
        /// Binary that was replaced.
        path: PathBuf,
    },
    /// Nothing was installed.
    Skipped(CheckOutcome),
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated {
                from,
                to,
                bytes,
                path,
            } => write!(
                f,
                "Updated {} -> {to} ({} downloaded) at {}",
                display_version(from),
                format_size(*bytes),
                path.display()
            ),
            Self::Skipped(check) => check.fmt(f),
        }
    }
}

fn display_version(v: &str) -> &str {
    if v.is_empty() {
        "unknown"
    } else {
        v
    }
}

/// Render a byte count: `"500 B"`, `"1.5 KB"`, `"10.0 MB"`.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    #[allow(clippy::cast_precision_loss)]
    let value = bytes as f64 / div as f64;
    format!("{value:.1} {}B", PREFIXES[exp])
}
