//! Configuration for agentsview-update.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Self-update configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// GitHub repository publishing releases (owner/repo format).
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Directory holding the update-check cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Minutes a cached check stays fresh for release builds.
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u64,

    /// Minutes a cached check stays fresh for dev builds.
    #[serde(default = "default_dev_check_interval")]
    pub dev_check_interval_minutes: u64,

    /// Name of the executable inside release archives.
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Binary to replace. Defaults to the `binary_name` executable beside
    /// the running one.
    #[serde(default)]
    pub install_path: Option<PathBuf>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            api_base_url: default_api_base_url(),
            cache_dir: default_cache_dir(),
            check_interval_minutes: default_check_interval(),
            dev_check_interval_minutes: default_dev_check_interval(),
            binary_name: default_binary_name(),
            install_path: None,
        }
    }
}

fn default_repo() -> String {
    "wesm/agentsview".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "agentsview")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".agentsview"))
}

fn default_binary_name() -> String {
    "agentsview".to_string()
}

const fn default_check_interval() -> u64 {
    60 // 1 hour
}

const fn default_dev_check_interval() -> u64 {
    15
}

impl UpdateConfig {
    /// How long a cached check is trusted before asking GitHub again.
    #[must_use]
    pub fn check_interval(&self, dev_build: bool) -> Duration {
        let minutes = if dev_build {
            self.dev_check_interval_minutes
        } else {
            self.check_interval_minutes
        };
        Duration::from_secs(minutes * 60)
    }

    /// Resolve the binary that an install replaces.
    ///
    /// Without a configured path this is `executable` in the running
    /// program's directory. When agentsview updates itself that is the
    /// running executable; a separate updater targets its sibling.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the running
    /// executable cannot be located.
    pub fn resolve_install_path(&self, executable: &str) -> crate::Result<PathBuf> {
        match self.install_path {
            Some(ref path) => Ok(path.clone()),
            None => Ok(std::env::current_exe()?.with_file_name(executable)),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
