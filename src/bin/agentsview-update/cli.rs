//! Command-line interface definition.

use agentsview_update::UpdateConfig;
use clap::Parser;
use color_eyre::eyre::eyre;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Update agentsview to the latest release.
#[derive(Parser, Debug)]
#[command(name = "agentsview-update")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Only report whether an update is available.
    #[arg(long)]
    pub check: bool,

    /// Ignore the cached check; allow dev builds to update.
    #[arg(long, short)]
    pub force: bool,

    /// Binary to replace (defaults to the installed agentsview).
    #[arg(long, env = "AGENTSVIEW_INSTALL_PATH")]
    pub install_path: Option<PathBuf>,

    /// Directory for the update-check cache.
    #[arg(long, env = "AGENTSVIEW_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// GitHub repository publishing releases (owner/repo).
    #[arg(long, env = "AGENTSVIEW_UPDATE_REPO")]
    pub repo: Option<String>,

    /// Version to treat as currently installed (defaults to what the
    /// installed binary reports for `--version`).
    #[arg(long, env = "AGENTSVIEW_VERSION")]
    pub current_version: Option<String>,

    /// Log level.
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Convert CLI arguments into an `UpdateConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<UpdateConfig> {
        let mut config = if let Some(ref path) = self.config {
            UpdateConfig::from_file(path)?
        } else {
            UpdateConfig::default()
        };

        if let Some(ref install_path) = self.install_path {
            config.install_path = Some(install_path.clone());
        }
        if let Some(ref cache_dir) = self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        if let Some(ref repo) = self.repo {
            config.repo = repo.clone();
        }

        Ok(config)
    }

    /// The version compared against the latest release.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary at `target` exists but does not
    /// report a version.
    pub async fn running_version(&self, target: &Path) -> color_eyre::Result<String> {
        match self.current_version {
            Some(ref version) => Ok(version.clone()),
            None => installed_version(target).await,
        }
    }
}

/// Ask the binary at `target` for its version.
///
/// A missing binary reports an empty version, which is treated as an
/// unknown build.
pub async fn installed_version(target: &Path) -> color_eyre::Result<String> {
    if !target.exists() {
        debug!("Nothing installed at {}", target.display());
        return Ok(String::new());
    }

    let output = Command::new(target).arg("--version").output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_version_output(&stdout)
        .filter(|_| output.status.success())
        .ok_or_else(|| {
            eyre!(
                "{} did not report a version; pass --current-version",
                target.display()
            )
        })
}

/// Pick the version token out of `--version` output such as
/// `agentsview v0.4.1` or `0.4.1`.
fn parse_version_output(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .find(|token| {
            token
                .strip_prefix('v')
                .unwrap_or(token)
                .starts_with(|c: char| c.is_ascii_digit())
        })
        .map(str::to_string)
}
