//! On-disk record of the last update check.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the cache inside the cache directory.
pub const CACHE_FILE: &str = "update_check.json";

/// The latest version seen on the last successful check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCheck {
    /// Latest released version at check time.
    pub version: String,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}

impl CachedCheck {
    /// Whether the check happened less than `max_age` ago.
    #[must_use]
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let Ok(age) = (now - self.checked_at).to_std() else {
            // Checked "in the future": clock moved backwards.
            return false;
        };
        age < max_age
    }
}

/// Location of the cache file within `dir`.
#[must_use]
pub fn cache_path(dir: &Path) -> PathBuf {
    dir.join(CACHE_FILE)
}

/// Record `version` as the latest release, stamped with the current time.
///
/// # Errors
///
/// Returns an error if `dir` cannot be created or the file written.
pub fn save_cache(version: &str, dir: &Path) -> Result<()> {
    let record = CachedCheck {
        version: version.to_string(),
        checked_at: Utc::now(),
    };
    let body = serde_json::to_vec_pretty(&record).map_err(std::io::Error::from)?;

    fs::create_dir_all(dir)?;
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(&body)?;
    staged.persist(cache_path(dir)).map_err(|e| e.error)?;
    Ok(())
}

/// Read the last recorded check.
///
/// # Errors
///
/// Returns [`Error::CacheMissing`] when no cache exists and
/// [`Error::CacheCorrupt`] when it cannot be parsed.
pub fn load_cache(dir: &Path) -> Result<CachedCheck> {
    let body = match fs::read(cache_path(dir)) {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::CacheMissing),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&body).map_err(|e| Error::CacheCorrupt(e.to_string()))
}
