//! Archive extraction module
//!
//! Streams a `.tgz` into a directory tree, reproducing directories, regular
//! files, modes and symlinks. If the native reader cannot process the
//! archive, the system `tar` is tried against the same pair of paths.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use flate2::read::GzDecoder;
use quarry_schema::{ArchiveEntry, EntryKind};
use tracing::{debug, warn};

use super::ArchiveError;
use super::scan::EntryScan;
use crate::Reporter;

/// How an archive ended up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Streamed natively; holds the number of entries materialized.
    Native(usize),
    /// The native reader failed and external `tar` succeeded.
    Fallback,
}

/// Extract `source` into `dest`, overwriting existing paths.
///
/// # Errors
///
/// Returns [`ArchiveError::UnsafePath`] for entries escaping `dest`, and a
/// fallback error if both the native reader and external `tar` fail.
pub fn extract(
    source: &Path,
    dest: &Path,
    reporter: &dyn Reporter,
) -> Result<ExtractOutcome, ArchiveError> {
    reporter.extracting(source, dest);

    match extract_native(source, dest) {
        Ok(count) => Ok(ExtractOutcome::Native(count)),
        Err(ArchiveError::Read(e)) => {
            warn!(archive = %source.display(), error = %e, "native extraction failed, using tar");
            reporter.warning(&format!(
                "Could not stream {} ({e}); falling back to system tar",
                source.display()
            ));
            extract_with_tar_command(source, dest)?;
            Ok(ExtractOutcome::Fallback)
        }
        Err(e) => Err(e),
    }
}

/// Stream `source` into `dest` without any external tool.
///
/// # Errors
///
/// Any read or write failure is [`ArchiveError::Read`]; entries escaping
/// `dest` are [`ArchiveError::UnsafePath`].
pub fn extract_native(source: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file = File::open(source).map_err(ArchiveError::Read)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    extract_tar(decoder, dest)
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<usize, ArchiveError> {
    fs::create_dir_all(dest).map_err(ArchiveError::Read)?;

    let mut archive = tar::Archive::new(reader);
    let mut scan = EntryScan::new();
    let mut count = 0;

    for entry in archive.entries().map_err(ArchiveError::Read)?.raw(true) {
        let mut entry = entry.map_err(ArchiveError::Read)?;
        let Some(item) = scan.next_entry(&mut entry).map_err(ArchiveError::Read)? else {
            continue;
        };

        let path = safe_join(dest, &item.full_name)?;
        let written = match item.kind {
            EntryKind::Directory => unpack_dir(&path, item.mode),
            EntryKind::File => unpack_file(&path, item.mode, &mut entry),
            EntryKind::Symlink => unpack_symlink(&path, &item),
            EntryKind::HardLink | EntryKind::Other(_) => {
                debug!(name = %item.full_name, kind = ?item.kind, "ignoring entry");
                continue;
            }
        };
        written.map_err(ArchiveError::Read)?;
        count += 1;
    }

    Ok(count)
}

/// Join an archive member name under `dest`, refusing anything that could
/// land outside it.
///
/// Besides `..` and absolute names, an intermediate component that is
/// already a symlink on disk is refused, so a link unpacked earlier cannot
/// redirect later entries out of `dest`. The final component may be a
/// symlink; it is replaced, not followed.
fn safe_join(dest: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
    let mut parts = Vec::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::UnsafePath(name.to_string()));
            }
        }
    }

    let mut path = dest.to_path_buf();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 && is_symlink(&path) {
            return Err(ArchiveError::UnsafePath(name.to_string()));
        }
        path.push(part);
    }
    Ok(path)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}

fn unpack_dir(path: &Path, mode: u32) -> io::Result<()> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if !meta.is_dir() {
            fs::remove_file(path)?;
        }
    }
    fs::create_dir_all(path)?;
    set_mode(path, mode)
}

fn unpack_file(path: &Path, mode: u32, content: &mut impl Read) -> io::Result<()> {
    remove_existing(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(path)?;
    io::copy(content, &mut out)?;
    drop(out);
    set_mode(path, mode)
}

fn unpack_symlink(path: &Path, item: &ArchiveEntry) -> io::Result<()> {
    let target = item.link_target.as_deref().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("symlink {} has no target", item.full_name),
        )
    })?;

    remove_existing(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, path)
    }
    #[cfg(not(unix))]
    {
        debug!(link = %path.display(), %target, "symlinks unsupported, skipping");
        Ok(())
    }
}

/// Clear whatever occupies `path` so a file or link can take its place.
fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Extract with the system `tar`: `tar -xzf <source> -C <dest>`.
///
/// # Errors
///
/// Returns [`ArchiveError::ToolMissing`] if no `tar` is on `PATH` and
/// [`ArchiveError::FallbackFailed`] if it exits unsuccessfully.
pub fn extract_with_tar_command(source: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let tar = which::which("tar").map_err(|e| ArchiveError::ToolMissing(e.to_string()))?;
    fs::create_dir_all(dest)?;

    let status = Command::new(tar)
        .arg("-xzf")
        .arg(source)
        .arg("-C")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        return Err(ArchiveError::FallbackFailed {
            status: status.to_string(),
        });
    }
    Ok(())
}
