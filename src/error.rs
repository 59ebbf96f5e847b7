//! Error types for agentsview-update.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the self-update subsystem.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or written.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Release lookup or download failed.
    #[error("Network error: {0}")]
    Network(String),

    /// A version string is not `MAJOR.MINOR.PATCH[-pre]`.
    #[error("Invalid version '{0}'")]
    Version(String),

    /// An archive entry would be written outside the destination directory.
    #[error("Unsafe path in archive: {path}")]
    UnsafePath {
        /// The offending entry path, as recorded in the archive.
        path: String,
    },

    /// The downloaded asset does not match its published digest.
    #[error("Checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Asset file name.
        asset: String,
        /// Digest listed in the checksum manifest.
        expected: String,
        /// Digest of the downloaded bytes.
        actual: String,
    },

    /// The checksum manifest has no entry for the asset.
    #[error("No checksum published for {0}")]
    ChecksumNotFound(String),

    /// The release archive is in a format extraction does not handle.
    #[error("Unsupported archive: {0}")]
    UnsupportedArchive(String),

    /// The release archive does not contain the expected executable.
    #[error("Binary '{0}' not found in release archive")]
    BinaryNotFound(String),

    /// The release carries no asset for this platform.
    #[error("No release asset named {0}")]
    AssetNotFound(String),

    /// No update check has been cached yet.
    #[error("No cached update check")]
    CacheMissing,

    /// The cached update check could not be parsed.
    #[error("Corrupt update cache: {0}")]
    CacheCorrupt(String),

    /// Installing failed and the previous binary could not be put back.
    #[error(
        "Install failed ({install}); restoring the previous binary also failed ({restore}). \
         The previous binary is at {}",
        .backup.display()
    )]
    RollbackFailed {
        /// The error that aborted the install.
        install: Box<Error>,
        /// The error raised while restoring the backup.
        restore: std::io::Error,
        /// Where the previous binary was left.
        backup: PathBuf,
    },
}

impl Error {
    /// Whether this error only means "no usable cached data".
    #[must_use]
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::CacheMissing | Self::CacheCorrupt(_))
    }

    /// Whether this error means the release failed verification.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::ChecksumNotFound(_)
        )
    }
}
