//! Release catalog and download collaborators.
//!
//! The orchestrator only sees [`ReleaseResolver`] and [`Fetcher`]; the
//! GitHub-backed implementations here are what the binary wires in.

use crate::error::{Error, Result};
use crate::update::version::parse_release;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Manifest asset names recognized on a release, in preference order.
const CHECKSUM_ASSET_NAMES: &[&str] = &["SHA256SUMS", "checksums.txt"];

const USER_AGENT: &str = concat!("agentsview-update/", env!("CARGO_PKG_VERSION"));

/// Target platform, named the way release assets are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// `linux`, `darwin`, `windows`, ...
    pub os: &'static str,
    /// `amd64`, `arm64`, ...
    pub arch: &'static str,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self { os, arch }
    }

    /// Archive extension used for this platform's releases.
    #[must_use]
    pub fn archive_extension(&self) -> &'static str {
        if self.os == "windows" {
            "zip"
        } else {
            "tar.gz"
        }
    }

    /// Release asset name, e.g. `agentsview_0.1.0_linux_amd64.tar.gz`.
    #[must_use]
    pub fn asset_name(&self, binary_name: &str, version: &str) -> String {
        format!(
            "{binary_name}_{}_{}_{}.{}",
            version.strip_prefix('v').unwrap_or(version),
            self.os,
            self.arch,
            self.archive_extension()
        )
    }

    /// File name of the executable inside the archive.
    #[must_use]
    pub fn executable_name(&self, binary_name: &str) -> String {
        if self.os == "windows" {
            format!("{binary_name}.exe")
        } else {
            binary_name.to_string()
        }
    }
}

/// What the release catalog reports about the latest release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Release tag, e.g. `v0.2.0`.
    pub version: String,
    /// Asset file name for the requested platform.
    pub asset_name: String,
    /// Download URL of the asset.
    pub asset_url: String,
    /// Asset size as published, in bytes.
    pub asset_size: u64,
    /// Download URL of the checksum manifest, if the release has one.
    pub checksums_url: Option<String>,
}

/// Source of "what is the latest release".
pub trait ReleaseResolver {
    /// Look up the latest release and its asset for `platform`.
    fn latest_release(&self, platform: &Platform)
        -> impl Future<Output = Result<ReleaseInfo>> + Send;
}

/// Source of raw bytes for a URL.
pub trait Fetcher {
    /// Download `url` in full.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: u64,
}

impl GitHubRelease {
    fn into_release_info(self, platform: &Platform, binary_name: &str) -> Result<ReleaseInfo> {
        parse_release(&self.tag_name)?;

        let asset_name = platform.asset_name(binary_name, &self.tag_name);
        let asset = self
            .assets
            .iter()
            .find(|a| a.name == asset_name)
            .ok_or_else(|| Error::AssetNotFound(asset_name.clone()))?;

        let checksums_url = CHECKSUM_ASSET_NAMES
            .iter()
            .find_map(|name| self.assets.iter().find(|a| a.name == *name))
            .or_else(|| {
                self.assets
                    .iter()
                    .find(|a| a.name.ends_with("_checksums.txt"))
            })
            .map(|a| a.browser_download_url.clone());

        Ok(ReleaseInfo {
            asset_url: asset.browser_download_url.clone(),
            asset_size: asset.size,
            asset_name,
            checksums_url,
            version: self.tag_name,
        })
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Network(format!("Failed to build HTTP client: {e}")))
}

/// Resolves the latest release through the GitHub REST API.
pub struct GitHubResolver {
    client: reqwest::Client,
    /// API base URL, e.g. `https://api.github.com`.
    api_base_url: String,
    /// GitHub repository (owner/repo format).
    repo: String,
    /// Executable name used in asset names.
    binary_name: String,
}

impl GitHubResolver {
    /// Create a resolver for `repo`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_base_url: &str, repo: &str, binary_name: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(15))?,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            binary_name: binary_name.to_string(),
        })
    }

    /// Get the tracked repository.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }
}

impl ReleaseResolver for GitHubResolver {
    async fn latest_release(&self, platform: &Platform) -> Result<ReleaseInfo> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base_url, self.repo);
        debug!("Fetching latest release from {url}");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Error::Network(format!("GitHub request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Network(format!("No releases published for {}", self.repo)));
        }
        if !status.is_success() {
            return Err(Error::Network(format!("GitHub API returned {status}")));
        }

        let release: GitHubRelease = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Invalid GitHub release response: {e}")))?;

        debug!("Latest release is {}", release.tag_name);
        release.into_release_info(platform, &self.binary_name)
    }
}

/// Downloads release files over HTTPS.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(300))?,
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Network(format!("Download of {url} failed: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Download of {url} interrupted: {e}")))?;
        Ok(bytes.to_vec())
    }
}
