//! Update flow tests: check, verify, extract, install.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::{TestHarness, TestRelease};
use agentsview_update::update::cache::{cache_path, load_cache, save_cache, CachedCheck};
use agentsview_update::{CheckOutcome, Error, Platform, UpdateEvent, UpdateOutcome};
use chrono::Utc;
use std::fs;

#[tokio::test]
async fn test_installs_newer_release() {
    let mut harness = TestHarness::new(&TestRelease::new("v0.2.0", b"agentsview 0.2.0"));
    harness.install_existing(b"agentsview 0.1.0");

    let outcome = harness.updater().run("v0.1.0", false).await.unwrap();

    match &outcome {
        UpdateOutcome::Updated {
            from,
            to,
            bytes,
            path,
        } => {
            assert_eq!(from, "v0.1.0");
            assert_eq!(to, "v0.2.0");
            assert!(*bytes > 0);
            assert_eq!(path, &harness.install_path());
        }
        other => panic!("expected update, got {other:?}"),
    }
    assert!(outcome.to_string().starts_with("Updated v0.1.0 -> v0.2.0"));

    assert_eq!(fs::read(harness.install_path()).unwrap(), b"agentsview 0.2.0");
    assert!(harness.stray_install_files().is_empty());
    assert_eq!(load_cache(&harness.cache_dir()).unwrap().version, "v0.2.0");

    let events = harness.drain_events();
    assert_eq!(events.first(), Some(&UpdateEvent::Checking));
    assert!(events.contains(&UpdateEvent::Extracted));
    assert_eq!(
        events.last(),
        Some(&UpdateEvent::Installed {
            version: "v0.2.0".to_string()
        })
    );
}

#[tokio::test]
async fn test_installs_into_empty_location() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"fresh"));

    harness.updater().run("0.1.0", false).await.unwrap();

    assert_eq!(fs::read(harness.install_path()).unwrap(), b"fresh");
}

#[tokio::test]
async fn test_release_over_prerelease() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"final"));
    harness.install_existing(b"rc");

    let outcome = harness.updater().run("0.2.0-rc3", false).await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::Updated { .. }));
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"final");
}

#[tokio::test]
async fn test_up_to_date_leaves_binary_alone() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"new"));
    harness.install_existing(b"current");

    let outcome = harness.updater().run("0.2.0", false).await.unwrap();

    assert!(matches!(
        outcome,
        UpdateOutcome::Skipped(CheckOutcome::UpToDate { .. })
    ));
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"current");
    assert_eq!(load_cache(&harness.cache_dir()).unwrap().version, "v0.2.0");
}

#[tokio::test]
async fn test_fresh_cache_skips_remote_lookup() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"new"));
    save_cache("v0.2.0", &harness.cache_dir()).unwrap();

    let outcome = harness.updater().check("v0.2.0", false).await.unwrap();

    assert!(matches!(outcome, CheckOutcome::UpToDate { ref latest, .. } if latest == "v0.2.0"));
    assert_eq!(harness.resolver_calls(), 0);
}

#[tokio::test]
async fn test_fresh_cache_with_newer_version_still_resolves() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"new"));
    save_cache("v0.2.0", &harness.cache_dir()).unwrap();

    let outcome = harness.updater().check("v0.1.0", false).await.unwrap();

    assert!(matches!(outcome, CheckOutcome::Available(_)));
    assert_eq!(harness.resolver_calls(), 1);
}

#[tokio::test]
async fn test_stale_cache_resolves() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"new"));
    let stale = CachedCheck {
        version: "v0.2.0".to_string(),
        checked_at: Utc::now() - chrono::Duration::hours(3),
    };
    fs::create_dir_all(harness.cache_dir()).unwrap();
    fs::write(
        cache_path(&harness.cache_dir()),
        serde_json::to_vec(&stale).unwrap(),
    )
    .unwrap();

    harness.updater().check("v0.2.0", false).await.unwrap();

    assert_eq!(harness.resolver_calls(), 1);
    assert!(load_cache(&harness.cache_dir()).unwrap().checked_at > stale.checked_at);
}

#[tokio::test]
async fn test_corrupt_cache_is_ignored() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"new"));
    fs::create_dir_all(harness.cache_dir()).unwrap();
    fs::write(cache_path(&harness.cache_dir()), b"garbage").unwrap();

    let outcome = harness.updater().check("v0.1.0", false).await.unwrap();

    assert!(matches!(outcome, CheckOutcome::Available(_)));
    assert_eq!(load_cache(&harness.cache_dir()).unwrap().version, "v0.2.0");
}

#[tokio::test]
async fn test_force_bypasses_cache() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"new"));
    save_cache("v0.1.0", &harness.cache_dir()).unwrap();

    let outcome = harness.updater().check("v0.1.0", true).await.unwrap();

    assert_eq!(harness.resolver_calls(), 1);
    match outcome {
        CheckOutcome::Available(info) => {
            assert_eq!(info.latest_version(), "v0.2.0");
            assert!(!info.dev_build);
        }
        other => panic!("expected available update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dev_build_needs_force() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"release"));
    harness.install_existing(b"local build");

    let outcome = harness
        .updater()
        .run("v0.2.0-4-gdeadbee-dirty", false)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        UpdateOutcome::Skipped(CheckOutcome::DevBuild { .. })
    ));
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"local build");

    let outcome = harness.updater().run("dev", true).await.unwrap();
    assert!(matches!(outcome, UpdateOutcome::Updated { .. }));
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"release");
}

#[tokio::test]
async fn test_checksum_mismatch_aborts_before_install() {
    let mut release = TestRelease::new("v0.2.0", b"tampered");
    release.manifest = Some(format!("{}  {}\n", "00".repeat(32), release.asset_name()));
    let harness = TestHarness::new(&release);
    harness.install_existing(b"working");

    let err = harness.updater().run("v0.1.0", false).await.unwrap_err();

    assert!(matches!(err, Error::ChecksumMismatch { .. }), "{err:?}");
    assert!(err.is_integrity());
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"working");
    assert!(harness.stray_install_files().is_empty());
}

#[tokio::test]
async fn test_missing_manifest_entry_aborts() {
    let mut release = TestRelease::new("v0.2.0", b"bin");
    release.manifest = Some("abc123  some_other_file.tar.gz\n".to_string());
    let harness = TestHarness::new(&release);
    harness.install_existing(b"working");

    let err = harness.updater().run("v0.1.0", false).await.unwrap_err();

    assert!(matches!(err, Error::ChecksumNotFound(_)), "{err:?}");
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"working");
}

#[tokio::test]
async fn test_release_without_manifest_aborts() {
    let mut release = TestRelease::new("v0.2.0", b"bin");
    release.with_manifest = false;
    let harness = TestHarness::new(&release);
    harness.install_existing(b"working");

    let err = harness.updater().run("v0.1.0", false).await.unwrap_err();

    assert!(err.is_integrity(), "{err:?}");
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"working");
}

#[tokio::test]
async fn test_traversal_archive_aborts_before_install() {
    let mut release = TestRelease::new("v0.2.0", b"bin");
    release
        .entries
        .push(("foo/../../../escaped".to_string(), b"pwned".to_vec()));
    let harness = TestHarness::new(&release);
    harness.install_existing(b"working");

    let err = harness.updater().run("v0.1.0", false).await.unwrap_err();

    assert!(
        matches!(err, Error::UnsafePath { ref path } if path == "foo/../../../escaped"),
        "{err:?}"
    );
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"working");
    assert!(!harness.root().join("escaped").exists());
}

#[tokio::test]
async fn test_archive_without_binary_aborts() {
    let mut release = TestRelease::new("v0.2.0", b"");
    release.entries = vec![("README.md".to_string(), b"docs".to_vec())];
    let harness = TestHarness::new(&release);
    harness.install_existing(b"working");

    let err = harness.updater().run("v0.1.0", false).await.unwrap_err();

    assert!(matches!(err, Error::BinaryNotFound(_)), "{err:?}");
    assert_eq!(fs::read(harness.install_path()).unwrap(), b"working");
}

#[tokio::test]
async fn test_binary_in_top_level_directory() {
    let mut release = TestRelease::new("v0.2.0", b"");
    release.entries = vec![
        (
            "agentsview_0.2.0_linux_amd64/agentsview".to_string(),
            b"nested".to_vec(),
        ),
        (
            "agentsview_0.2.0_linux_amd64/LICENSE".to_string(),
            b"MIT".to_vec(),
        ),
    ];
    let harness = TestHarness::new(&release);

    harness.updater().run("v0.1.0", false).await.unwrap();

    assert_eq!(fs::read(harness.install_path()).unwrap(), b"nested");
}

#[tokio::test]
async fn test_zip_assets_are_unsupported() {
    let harness = TestHarness::new(&TestRelease::new("v0.2.0", b"bin"));
    let CheckOutcome::Available(mut info) = harness.updater().check("v0.1.0", false).await.unwrap()
    else {
        panic!("expected available update");
    };
    let windows = Platform {
        os: "windows",
        arch: "amd64",
    };
    info.release.asset_name = windows.asset_name("agentsview", "v0.2.0");

    let err = harness.updater().install(&info).await.unwrap_err();

    assert!(matches!(err, Error::UnsupportedArchive(_)), "{err:?}");
}
