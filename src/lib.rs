//! Self-update subsystem for the agentsview command-line tool.
//!
//! Decides whether a newer release exists, downloads and verifies the
//! release archive, and replaces the installed executable in place. A failed
//! install always leaves the previous binary where it was.
//!
//! ```text
//! cache ──fresh──▶ stop
//!   │ stale/missing
//!   ▼
//! resolve latest ──not newer──▶ save cache, stop
//!   │ newer
//!   ▼
//! download ─▶ verify sha256 ─▶ extract (sanitized) ─▶ install (.old backup) ─▶ save cache
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod update;

pub use config::UpdateConfig;
pub use error::{Error, Result};
pub use event::UpdateEvent;
pub use update::{
    format_size, CheckOutcome, Fetcher, GitHubResolver, HttpFetcher, Platform, ReleaseInfo,
    ReleaseResolver, UpdateInfo, UpdateOutcome, Updater,
};
