//! Release archive extraction.
//!
//! Only regular files and directories are unpacked. Links are skipped so a
//! crafted archive cannot plant a symlink and write through it later.

use crate::error::{Error, Result};
use crate::update::sanitize::sanitize_path;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, warn};

/// Unpack a `.tar.gz` file into `dest_dir`.
///
/// Every entry path goes through [`sanitize_path`]; the first unsafe entry
/// aborts extraction. Files already written are left in place and the
/// caller is expected to discard `dest_dir`.
///
/// # Errors
///
/// Returns [`Error::UnsafePath`] for an entry escaping `dest_dir`, or an
/// I/O error if the archive is unreadable or a file cannot be written.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    debug!("Extracting {} into {}", archive_path.display(), dest_dir.display());

    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_string_lossy().into_owned();
        let target = sanitize_path(dest_dir, &entry_path)?;

        match entry.header().entry_type() {
            EntryType::Directory => fs::create_dir_all(&target)?,
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mode = entry.header().mode()?;
                write_file(&mut entry, &target, mode)?;
            }
            EntryType::Symlink | EntryType::Link => {
                warn!("Skipping link entry in release archive: {entry_path}");
            }
            other => debug!("Skipping {other:?} entry: {entry_path}"),
        }
    }

    Ok(())
}

fn write_file(reader: &mut impl Read, target: &Path, mode: u32) -> Result<()> {
    // Never write through a link left at the target.
    if fs::symlink_metadata(target).is_ok_and(|meta| meta.file_type().is_symlink()) {
        fs::remove_file(target)?;
    }

    let mut out = File::create(target)?;
    io::copy(reader, &mut out)?;
    set_mode(target, mode)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Locate `binary_name` in an extracted release.
///
/// Releases put the binary at the archive root or inside one top-level
/// directory (`agentsview_0.1.0_linux_amd64/agentsview`).
///
/// # Errors
///
/// Returns [`Error::BinaryNotFound`] if neither location holds a file of
/// that name.
pub fn find_binary(extract_dir: &Path, binary_name: &str) -> Result<PathBuf> {
    let direct = extract_dir.join(binary_name);
    if direct.is_file() {
        return Ok(direct);
    }

    for entry in fs::read_dir(extract_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let nested = entry.path().join(binary_name);
            if nested.is_file() {
                return Ok(nested);
            }
        }
    }

    Err(Error::BinaryNotFound(binary_name.to_string()))
}
