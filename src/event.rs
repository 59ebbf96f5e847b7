//! Update progress events.

use std::fmt;
use tokio::sync::broadcast;

use crate::update::format_size;

/// Progress reported while checking for and installing an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// Asking the release catalog for the latest version.
    Checking,

    /// A newer release exists.
    UpdateAvailable {
        /// Version currently running.
        current: String,
        /// Latest published version.
        latest: String,
    },

    /// Download of a release file started.
    Downloading {
        /// File being fetched.
        name: String,
    },

    /// Download of a release file finished.
    Downloaded {
        /// File fetched.
        name: String,
        /// Bytes received.
        bytes: u64,
    },

    /// The asset matched its published checksum.
    Verified {
        /// Asset file name.
        asset: String,
    },

    /// The archive was unpacked into the scratch directory.
    Extracted,

    /// The new binary is in place.
    Installed {
        /// Version now installed.
        version: String,
    },
}

impl fmt::Display for UpdateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => write!(f, "Checking for updates..."),
            Self::UpdateAvailable { current, latest } => {
                write!(f, "Update available: {current} -> {latest}")
            }
            Self::Downloading { name } => write!(f, "Downloading {name}..."),
            Self::Downloaded { name, bytes } => {
                write!(f, "Downloaded {name} ({})", format_size(*bytes))
            }
            Self::Verified { asset } => write!(f, "Checksum verified for {asset}"),
            Self::Extracted => write!(f, "Extracted release archive"),
            Self::Installed { version } => write!(f, "Installed {version}"),
        }
    }
}

/// Channel for receiving update events.
pub type UpdateEventsChannel = broadcast::Receiver<UpdateEvent>;

/// Sender for update events.
pub type UpdateEventsSender = broadcast::Sender<UpdateEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (UpdateEventsSender, UpdateEventsChannel) {
    broadcast::channel(64)
}
