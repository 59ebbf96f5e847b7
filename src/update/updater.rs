//! Check → download → verify → extract → install.

use crate::config::UpdateConfig;
use crate::error::{Error, Result};
use crate::event::{UpdateEvent, UpdateEventsSender};
use crate::update::archive::{extract_tar_gz, find_binary};
use crate::update::cache::{load_cache, save_cache};
use crate::update::checksum::{verify_file, ChecksumManifest};
use crate::update::install::install_binary_to;
use crate::update::release::{Fetcher, Platform, ReleaseResolver};
use crate::update::version::ToolVersion;
use crate::update::{CheckOutcome, UpdateInfo, UpdateOutcome};
use chrono::Utc;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Drives one update attempt against a release catalog.
pub struct Updater<R, F> {
    config: UpdateConfig,
    resolver: R,
    fetcher: F,
    platform: Platform,
    events: Option<UpdateEventsSender>,
}

impl<R: ReleaseResolver, F: Fetcher> Updater<R, F> {
    /// Create an updater for the current platform.
    #[must_use]
    pub fn new(config: UpdateConfig, resolver: R, fetcher: F) -> Self {
        Self {
            config,
            resolver,
            fetcher,
            platform: Platform::current(),
            events: None,
        }
    }

    /// Target a different platform's release assets.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Broadcast progress on `events`.
    #[must_use]
    pub fn with_events(mut self, events: UpdateEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: UpdateEvent) {
        debug!("{event}");
        if let Some(ref events) = self.events {
            let _ = events.send(event);
        }
    }

    /// Decide whether a newer release exists.
    ///
    /// A fresh cache entry that is not newer than `current` answers without
    /// contacting the catalog. `force` skips the cache and, for dev builds,
    /// offers the latest release regardless of version.
    ///
    /// # Errors
    ///
    /// Returns an error if the release catalog cannot be queried. Cache
    /// problems are logged and otherwise ignored.
    pub async fn check(&self, current: &str, force: bool) -> Result<CheckOutcome> {
        let running = ToolVersion::new(current);

        if !force {
            if let Some(outcome) = self.check_cached(&running) {
                return Ok(outcome);
            }
        }

        self.emit(UpdateEvent::Checking);
        let release = self.resolver.latest_release(&self.platform).await?;
        info!("Latest release: {}", release.version);

        if let Err(e) = save_cache(&release.version, &self.config.cache_dir) {
            warn!("Could not write update cache: {e}");
        }

        if running.is_dev_build() && !force {
            return Ok(CheckOutcome::DevBuild {
                current: running.to_string(),
                latest: release.version,
            });
        }

        let latest = ToolVersion::new(&release.version);
        if !running.is_dev_build() && !latest.is_newer_than(&running) {
            return Ok(CheckOutcome::UpToDate {
                current: running.to_string(),
                latest: release.version,
            });
        }

        self.emit(UpdateEvent::UpdateAvailable {
            current: running.to_string(),
            latest: release.version.clone(),
        });
        Ok(CheckOutcome::Available(UpdateInfo {
            current_version: current.to_string(),
            release,
            dev_build: running.is_dev_build(),
        }))
    }

    fn check_cached(&self, running: &ToolVersion) -> Option<CheckOutcome> {
        let cached = match load_cache(&self.config.cache_dir) {
            Ok(cached) => cached,
            Err(e) if e.is_cache_miss() => {
                debug!("No usable update cache: {e}");
                return None;
            }
            Err(e) => {
                warn!("Could not read update cache: {e}");
                return None;
            }
        };

        let max_age = self.config.check_interval(running.is_dev_build());
        if !cached.is_fresh(max_age, Utc::now()) {
            debug!("Cached update check from {} is stale", cached.checked_at);
            return None;
        }

        if running.is_dev_build() {
            return Some(CheckOutcome::DevBuild {
                current: running.to_string(),
                latest: cached.version,
            });
        }
        let cached_version = ToolVersion::new(&cached.version);
        if cached_version.is_newer_than(running) {
            // Need asset details from the catalog.
            return None;
        }

        debug!(
            "Cached check ({}) is fresh for {}; skipping remote lookup",
            cached_version.normalized(),
            running.normalized()
        );
        Some(CheckOutcome::UpToDate {
            current: running.to_string(),
            latest: cached.version,
        })
    }

    /// Download, verify and install `info`.
    ///
    /// # Errors
    ///
    /// Returns an integrity error if the archive does not match its
    /// published checksum, [`Error::UnsafePath`] if the archive tries to
    /// escape its scratch directory, and install errors after the previous
    /// binary has been restored.
    pub async fn install(&self, info: &UpdateInfo) -> Result<UpdateOutcome> {
        let release = &info.release;
        if !release.asset_name.ends_with(".tar.gz") {
            return Err(Error::UnsupportedArchive(release.asset_name.clone()));
        }
        let checksums_url = release
            .checksums_url
            .as_deref()
            .ok_or_else(|| Error::ChecksumNotFound(release.asset_name.clone()))?;

        let scratch = tempfile::Builder::new()
            .prefix("agentsview-update-")
            .tempdir()?;

        self.emit(UpdateEvent::Downloading {
            name: release.asset_name.clone(),
        });
        let archive = self.fetcher.fetch(&release.asset_url).await?;
        let bytes = archive.len() as u64;
        self.emit(UpdateEvent::Downloaded {
            name: release.asset_name.clone(),
            bytes,
        });
        let archive_path = scratch.path().join("release.tar.gz");
        fs::write(&archive_path, &archive)?;
        drop(archive);

        let manifest = self.fetcher.fetch(checksums_url).await?;
        let manifest = ChecksumManifest::parse(&String::from_utf8_lossy(&manifest));
        verify_file(&archive_path, &manifest, &release.asset_name)?;
        self.emit(UpdateEvent::Verified {
            asset: release.asset_name.clone(),
        });

        let extract_dir = scratch.path().join("extract");
        fs::create_dir(&extract_dir)?;
        extract_tar_gz(&archive_path, &extract_dir)?;
        self.emit(UpdateEvent::Extracted);

        let executable = self.platform.executable_name(&self.config.binary_name);
        let binary = find_binary(&extract_dir, &executable)?;
        let target = self.config.resolve_install_path(&executable)?;
        self.install_from(&binary, &target)?;

        if let Err(e) = save_cache(&release.version, &self.config.cache_dir) {
            warn!("Could not write update cache: {e}");
        }
        self.emit(UpdateEvent::Installed {
            version: release.version.clone(),
        });

        Ok(UpdateOutcome::Updated {
            from: info.current_version.clone(),
            to: release.version.clone(),
            bytes,
            path: target,
        })
    }

    fn install_from(&self, binary: &Path, target: &Path) -> Result<()> {
        info!(
            "Installing {} over {}",
            self.config.binary_name,
            target.display()
        );
        install_binary_to(binary, target)
    }

    /// Check for a newer release and install it if there is one.
    ///
    /// # Errors
    ///
    /// See [`Updater::check`] and [`Updater::install`].
    pub async fn run(&self, current: &str, force: bool) -> Result<UpdateOutcome> {
        match self.check(current, force).await? {
            CheckOutcome::Available(info) => self.install(&info).await,
            other => Ok(UpdateOutcome::Skipped(other)),
        }
    }
}
