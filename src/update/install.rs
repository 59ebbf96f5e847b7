//! In-place replacement of the installed binary.
//!
//! The old binary is renamed to `<dst>.old` before anything is written, and
//! the new one is staged in a temporary file next to `dst` and renamed over
//! it. At no point is `dst` a partially written file. If staging fails the
//! backup is renamed back. A `dst` that is a symlink is resolved first, so
//! the file behind the link is the one replaced.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix appended to the destination while an install is in flight.
pub const BACKUP_SUFFIX: &str = ".old";

/// Path of the backup kept for `dst` during an install.
#[must_use]
pub fn backup_path(dst: &Path) -> PathBuf {
    let mut name = OsString::from(dst.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Replace `dst` with a copy of `src`.
///
/// # Errors
///
/// Returns the install error after putting the previous binary back. If
/// that also fails, returns [`Error::RollbackFailed`] naming the backup
/// file that still holds the previous binary.
pub fn install_binary_to(src: &Path, dst: &Path) -> Result<()> {
    install_with(src, &resolve_target(dst)?, stage_and_swap)
}

fn resolve_target(dst: &Path) -> Result<PathBuf> {
    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let real = fs::canonicalize(dst)?;
            debug!("{} links to {}", dst.display(), real.display());
            Ok(real)
        }
        _ => Ok(dst.to_path_buf()),
    }
}

fn install_with(
    src: &Path,
    dst: &Path,
    swap: impl FnOnce(&Path, &Path) -> Result<()>,
) -> Result<()> {
    let backup = if fs::symlink_metadata(dst).is_ok() {
        Some(Backup::create(dst)?)
    } else {
        None
    };

    match swap(src, dst) {
        Ok(()) => {
            if let Some(backup) = backup {
                backup.discard();
            }
            info!("Installed {}", dst.display());
            Ok(())
        }
        Err(err) => {
            warn!("Install to {} failed: {err}", dst.display());
            match backup {
                Some(backup) => {
                    let backup_file = backup.path.clone();
                    match backup.restore() {
                        Ok(()) => Err(err),
                        Err(restore) => Err(Error::RollbackFailed {
                            install: Box::new(err),
                            restore,
                            backup: backup_file,
                        }),
                    }
                }
                None => Err(err),
            }
        }
    }
}

/// Copy `src` into a temp file beside `dst`, then rename it into place.
fn stage_and_swap(src: &Path, dst: &Path) -> Result<()> {
    let dir = match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut input = File::open(src)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".agentsview-update-")
        .tempfile_in(dir)?;
    io::copy(&mut input, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    make_executable(staged.path(), &input.metadata()?)?;

    staged.persist(dst).map_err(|e| e.error)?;
    debug!("Moved {} into {}", src.display(), dst.display());
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path, source: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = (source.permissions().mode() & 0o777) | 0o755;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path, _source: &fs::Metadata) -> io::Result<()> {
    Ok(())
}

/// The previous binary, parked at `<dst>.old`.
///
/// Dropped without [`Backup::discard`] or [`Backup::restore`], it puts the
/// previous binary back.
struct Backup {
    original: PathBuf,
    path: PathBuf,
    armed: bool,
}

impl Backup {
    fn create(original: &Path) -> Result<Self> {
        let path = backup_path(original);
        if fs::symlink_metadata(&path).is_ok() {
            debug!("Removing stale backup {}", path.display());
            fs::remove_file(&path)?;
        }
        fs::rename(original, &path)?;
        debug!("Backed up {} to {}", original.display(), path.display());
        Ok(Self {
            original: original.to_path_buf(),
            path,
            armed: true,
        })
    }

    fn restore(mut self) -> io::Result<()> {
        self.armed = false;
        fs::rename(&self.path, &self.original)?;
        info!("Restored previous binary to {}", self.original.display());
        Ok(())
    }

    fn discard(mut self) {
        self.armed = false;
        // A running executable cannot be deleted on Windows; the next
        // install clears it.
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove backup {}: {e}", self.path.display());
        }
    }
}

impl Drop for Backup {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::rename(&self.path, &self.original) {
                warn!(
                    "Could not restore {} from {}: {e}",
                    self.original.display(),
                    self.path.display()
                );
            }
        }
    }
}
