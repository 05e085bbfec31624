//! Archive repacking module
//!
//! Copies every entry of a `.tgz` into a new archive and appends extra files
//! under the distribution's library directory.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use quarry_schema::EntryKind;
use tracing::{debug, info};

use super::ArchiveError;
use super::scan::EntryScan;
use crate::Reporter;

/// Repack `source` into `dest`, adding `extra_files` to the first directory
/// whose name ends with `library_root`.
///
/// Original entries keep their names, modes, contents and link targets.
/// Extra files that do not exist are skipped with a warning. The destination
/// is only created once the whole archive has been assembled.
///
/// # Errors
///
/// Returns [`ArchiveError::MissingInjectionTarget`] if no matching directory
/// exists, [`ArchiveError::Read`] if the source cannot be parsed, and
/// [`ArchiveError::Io`] for write failures.
pub fn add_libraries(
    source: &Path,
    dest: &Path,
    extra_files: &[PathBuf],
    library_root: &str,
    reporter: &dyn Reporter,
) -> Result<PathBuf, ArchiveError> {
    let suffix = library_root.trim_matches('/');
    let input = File::open(source).map_err(ArchiveError::Read)?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(input)));
    let mut builder = tar::Builder::new(tempfile::tempfile()?);

    let mut scan = EntryScan::new();
    let mut injection_dir: Option<String> = None;
    let mut copied = 0usize;

    for entry in archive.entries().map_err(ArchiveError::Read)?.raw(true) {
        let mut entry = entry.map_err(ArchiveError::Read)?;
        let Some(item) = scan.next_entry(&mut entry).map_err(ArchiveError::Read)? else {
            continue;
        };

        let mut header = entry.header().clone();
        match item.kind {
            EntryKind::Directory => {
                if injection_dir.is_none() && is_injection_dir(item.trimmed_name(), suffix) {
                    debug!(dir = %item.trimmed_name(), "found library directory");
                    injection_dir = Some(item.trimmed_name().to_string());
                }
                builder.append_data(&mut header, &item.full_name, io::empty())?;
            }
            EntryKind::Symlink | EntryKind::HardLink => {
                let target = item.link_target.as_deref().ok_or_else(|| {
                    ArchiveError::Read(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("link {} has no target", item.full_name),
                    ))
                })?;
                builder.append_link(&mut header, &item.full_name, target)?;
            }
            EntryKind::File | EntryKind::Other(_) => {
                builder.append_data(&mut header, &item.full_name, &mut entry)?;
            }
        }
        copied += 1;
    }

    let Some(dir) = injection_dir else {
        return Err(ArchiveError::MissingInjectionTarget {
            suffix: suffix.to_string(),
        });
    };

    let mut added = 0usize;
    for path in extra_files {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            reporter.warning(&format!("Skipping {}: not a file name", path.display()));
            continue;
        };
        let Ok(meta) = fs::metadata(path) else {
            reporter.warning(&format!("Skipping {}: file not found", path.display()));
            continue;
        };

        let member = format!("{dir}/{name}");
        let mut header = tar::Header::new_gnu();
        header.set_metadata(&meta);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(file_mode(&meta));
        builder.append_data(&mut header, &member, File::open(path)?)?;
        reporter.info(&format!("Added {member}"));
        added += 1;
    }

    let mut tar_file = builder.into_inner()?;
    tar_file.seek(SeekFrom::Start(0))?;

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let staged = tempfile::NamedTempFile::new_in(parent)?;
    let mut encoder = GzEncoder::new(BufWriter::new(staged), Compression::default());
    io::copy(&mut tar_file, &mut encoder)?;
    let staged = encoder
        .finish()?
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?;
    staged.persist(dest).map_err(|e| e.error)?;

    info!(
        archive = %dest.display(),
        entries = copied,
        added,
        "repacked archive"
    );
    Ok(dest.to_path_buf())
}

/// Whether `name` ends with `suffix` on a path component boundary.
fn is_injection_dir(name: &str, suffix: &str) -> bool {
    name == suffix
        || name
            .strip_suffix(suffix)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    0o644
}
