//! Version strings as produced by the release build.
//!
//! Builds stamp one of: `dev`, `unknown`, an empty string, a release tag
//! (`0.1.0`, `v0.1.0`, `v0.1.0-rc1`) or a git-describe string
//! (`v0.1.0-3-gabc1234-dirty`). Comparison uses semver core precedence
//! with a simplified pre-release rule: the trailing number decides, so
//! `rc10` sorts after `rc9`.

use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static GIT_DESCRIBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+\.\d+\.\d+)(?:-[0-9A-Za-z.]+?)?-\d+-g[0-9a-fA-F]+(?:-dirty)?$")
        .expect("Invalid git-describe regex")
});

#[allow(clippy::expect_used)]
static NUMBERED_PRERELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)(\d+)$").expect("Invalid pre-release regex")
});

/// Whether `v` names an unreleased, locally built binary.
#[must_use]
pub fn is_dev_build_version(v: &str) -> bool {
    matches!(v, "" | "dev" | "unknown") || GIT_DESCRIBE.is_match(v)
}

/// Normalize to `vMAJOR.MINOR.PATCH[-pre]`.
///
/// `rc1` becomes `rc.1` so the number sorts numerically, numeric
/// identifiers lose leading zeros (`rc01` and `rc.01` both become `rc.1`),
/// and git-describe strings collapse to their base tag. Idempotent.
#[must_use]
pub fn normalize_semver(v: &str) -> String {
    if let Some(caps) = GIT_DESCRIBE.captures(v) {
        return format!("v{}", &caps[1]);
    }

    let bare = v.strip_prefix('v').unwrap_or(v);
    match bare.split_once('-') {
        Some((core, pre)) => format!("v{core}-{}", normalize_prerelease(pre)),
        None => format!("v{bare}"),
    }
}

fn normalize_prerelease(pre: &str) -> String {
    let dotted = match NUMBERED_PRERELEASE.captures(pre) {
        Some(caps) => format!("{}.{}", &caps[1], &caps[2]),
        None => pre.to_string(),
    };
    dotted
        .split('.')
        .map(strip_leading_zeros)
        .collect::<Vec<_>>()
        .join(".")
}

fn strip_leading_zeros(ident: &str) -> &str {
    if ident.len() < 2 || !ident.bytes().all(|b| b.is_ascii_digit()) {
        return ident;
    }
    match ident.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    }
}

/// Parse a version into its semver form.
///
/// # Errors
///
/// Returns [`Error::Version`] unless `v` normalizes to
/// `MAJOR.MINOR.PATCH[-pre]`.
pub fn parse_release(v: &str) -> Result<semver::Version> {
    let normalized = normalize_semver(v);
    let bare = normalized.strip_prefix('v').unwrap_or(&normalized);
    semver::Version::parse(bare).map_err(|_| Error::Version(v.to_string()))
}

/// Whether `a` is strictly newer than `b`.
#[must_use]
pub fn is_newer(a: &str, b: &str) -> bool {
    compare_versions(a, b) == Ordering::Greater
}

/// Order two version strings.
///
/// Strings that do not parse fall back to comparing their normalized text,
/// which keeps the order total and deterministic.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_release(a), parse_release(b)) {
        (Ok(va), Ok(vb)) => compare_parsed(&va, &vb),
        _ => normalize_semver(a).cmp(&normalize_semver(b)),
    }
}

fn compare_parsed(a: &semver::Version, b: &semver::Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| match (a.pre.is_empty(), b.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_prerelease(a.pre.as_str(), b.pre.as_str()),
        })
}

fn compare_prerelease(a: &str, b: &str) -> Ordering {
    trailing_number(a)
        .cmp(&trailing_number(b))
        .then_with(|| a.cmp(b))
}

fn trailing_number(pre: &str) -> Option<u64> {
    pre.rsplit('.').next().and_then(|last| last.parse().ok())
}

/// A version string with its normalized form and build classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    raw: String,
    normalized: String,
    dev_build: bool,
}

impl ToolVersion {
    /// Classify and normalize a raw version string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            normalized: normalize_semver(&raw),
            dev_build: is_dev_build_version(&raw),
            raw,
        }
    }

    /// The string as given.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The `vMAJOR.MINOR.PATCH[-pre]` form.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Whether this is a dev build.
    #[must_use]
    pub fn is_dev_build(&self) -> bool {
        self.dev_build
    }

    /// Whether this version is strictly newer than `other`.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        is_newer(&self.raw, &other.raw)
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            write!(f, "unknown")
        } else {
            write!(f, "{}", self.raw)
        }
    }
}
