//! Test harness for end-to-end update runs.
//!
//! The `TestHarness` builds a real release (tar.gz archive plus SHA256SUMS
//! manifest), serves it through in-memory collaborators, and points the
//! updater at a scratch install path and cache directory.

use agentsview_update::event::{create_event_channel, UpdateEventsChannel};
use agentsview_update::{
    Error, Fetcher, Platform, ReleaseInfo, ReleaseResolver, Result, UpdateConfig, UpdateEvent,
    Updater,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tar::{Builder, EntryType, Header};
use tempfile::TempDir;

/// Platform every harness release is published for.
pub const LINUX: Platform = Platform {
    os: "linux",
    arch: "amd64",
};

const ASSET_URL: &str = "https://releases.test/asset.tar.gz";
const SUMS_URL: &str = "https://releases.test/SHA256SUMS";

/// A release as it would appear on GitHub.
pub struct TestRelease {
    /// Release tag.
    pub version: String,
    /// Archive entries: (path, content).
    pub entries: Vec<(String, Vec<u8>)>,
    /// Override for the manifest body; `None` publishes correct digests.
    pub manifest: Option<String>,
    /// Whether the release links a checksum manifest at all.
    pub with_manifest: bool,
}

impl TestRelease {
    /// A release whose archive holds a single `agentsview` binary.
    #[must_use]
    pub fn new(version: &str, binary: &[u8]) -> Self {
        Self {
            version: version.to_string(),
            entries: vec![("agentsview".to_string(), binary.to_vec())],
            manifest: None,
            with_manifest: true,
        }
    }

    /// Asset name for this release.
    #[must_use]
    pub fn asset_name(&self) -> String {
        LINUX.asset_name("agentsview", &self.version)
    }

    /// Build the tar.gz bytes. Names are written raw so hostile paths
    /// survive into the archive.
    #[must_use]
    pub fn archive(&self) -> Vec<u8> {
        let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, data) in &self.entries {
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_mode(0o755);
            let raw = &mut header.as_gnu_mut().expect("gnu header").name;
            raw[..name.len()].copy_from_slice(name.as_bytes());
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder.append(&header, data.as_slice()).expect("append entry");
        }
        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip")
    }
}

/// Serves one fixed release.
pub struct StaticResolver {
    release: ReleaseInfo,
    calls: Arc<AtomicUsize>,
}

impl ReleaseResolver for StaticResolver {
    async fn latest_release(&self, _platform: &Platform) -> Result<ReleaseInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.release.clone())
    }
}

/// Serves downloads from memory.
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("404 for {url}")))
    }
}

/// Scratch install location, cache and collaborators for one test.
pub struct TestHarness {
    /// Holds install dir and cache dir.
    root: TempDir,
    /// Number of catalog lookups made.
    resolver_calls: Arc<AtomicUsize>,
    updater: Updater<StaticResolver, MemoryFetcher>,
    events: UpdateEventsChannel,
}

impl TestHarness {
    /// Publish `release` and prepare an updater against it.
    #[must_use]
    pub fn new(release: &TestRelease) -> Self {
        let root = TempDir::new().expect("tempdir");
        std::fs::create_dir(root.path().join("bin")).expect("bin dir");

        let archive = release.archive();
        let asset_name = release.asset_name();
        let manifest = release.manifest.clone().unwrap_or_else(|| {
            format!(
                "abc123  other_file.tar.gz\n{}  {asset_name}\n",
                hex::encode(Sha256::digest(&archive))
            )
        });

        let mut files = HashMap::new();
        files.insert(SUMS_URL.to_string(), manifest.into_bytes());
        let info = ReleaseInfo {
            version: release.version.clone(),
            asset_name,
            asset_url: ASSET_URL.to_string(),
            asset_size: archive.len() as u64,
            checksums_url: release.with_manifest.then(|| SUMS_URL.to_string()),
        };
        files.insert(ASSET_URL.to_string(), archive);

        let config = UpdateConfig {
            cache_dir: root.path().join("cache"),
            install_path: Some(root.path().join("bin").join("agentsview")),
            ..UpdateConfig::default()
        };

        let resolver_calls = Arc::new(AtomicUsize::new(0));
        let resolver = StaticResolver {
            release: info,
            calls: Arc::clone(&resolver_calls),
        };
        let (events_tx, events) = create_event_channel();
        let updater = Updater::new(config, resolver, MemoryFetcher { files })
            .with_platform(LINUX)
            .with_events(events_tx);

        Self {
            root,
            resolver_calls,
            updater,
            events,
        }
    }

    /// The updater under test.
    #[must_use]
    pub fn updater(&self) -> &Updater<StaticResolver, MemoryFetcher> {
        &self.updater
    }

    /// Path of the installed binary.
    #[must_use]
    pub fn install_path(&self) -> PathBuf {
        self.root.path().join("bin").join("agentsview")
    }

    /// Directory holding the update cache.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.path().join("cache")
    }

    /// Scratch root for assertions about stray files.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Put a "currently installed" binary in place.
    pub fn install_existing(&self, content: &[u8]) {
        std::fs::write(self.install_path(), content).expect("write existing binary");
    }

    /// Catalog lookups so far.
    #[must_use]
    pub fn resolver_calls(&self) -> usize {
        self.resolver_calls.load(Ordering::SeqCst)
    }

    /// Events emitted so far.
    pub fn drain_events(&mut self) -> Vec<UpdateEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Files in the install directory other than the binary itself.
    #[must_use]
    pub fn stray_install_files(&self) -> Vec<String> {
        std::fs::read_dir(self.root.path().join("bin"))
            .expect("read bin dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .filter(|name| name != "agentsview")
            .collect()
    }
}
