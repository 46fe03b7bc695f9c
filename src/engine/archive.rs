use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::cancel::CancelToken;
use crate::engine::check_cancel;
use crate::error::OpError;

const DIR_MODE: u32 = 0o755;
#[cfg(not(unix))]
const FILE_MODE: u32 = 0o644;

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    FILE_MODE
}

/// Zip entry name of `entry` relative to the directory holding the selection.
fn entry_name(base: &Path, entry: &Path) -> Option<String> {
    let relative = entry.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Packs every selected file and folder into one zip at `archive_path`.
/// Folders keep their relative structure and get explicit directory entries,
/// so empty ones survive extraction. Returns the number of entries written.
pub(crate) fn build_archive(
    selection: &[PathBuf],
    archive_path: &Path,
    cancel: &CancelToken,
) -> Result<usize, OpError> {
    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut written = 0usize;

    for selected in selection {
        check_cancel(cancel)?;
        let base = selected.parent().unwrap_or_else(|| Path::new(""));
        for entry in WalkDir::new(selected).sort_by_file_name() {
            check_cancel(cancel)?;
            let entry = entry.map_err(|err| OpError::Transfer(err.to_string()))?;
            let Some(name) = entry_name(base, entry.path()) else {
                continue;
            };
            let file_type = entry.file_type();
            if file_type.is_dir() {
                zip.add_directory(format!("{name}/"), options.unix_permissions(DIR_MODE))
                    .map_err(|err| OpError::Unexpected(format!("zip: {err}")))?;
            } else if file_type.is_file() {
                let mode = file_mode(&entry.metadata().map_err(io::Error::from)?);
                zip.start_file(name, options.unix_permissions(mode))
                    .map_err(|err| OpError::Unexpected(format!("zip: {err}")))?;
                let mut source = File::open(entry.path())?;
                io::copy(&mut source, &mut zip)?;
            } else {
                warn!("skipping special file {}", entry.path().display());
                continue;
            }
            written += 1;
        }
    }

    zip.finish()
        .map_err(|err| OpError::Unexpected(format!("zip: {err}")))?;
    debug!("archive {} holds {written} entries", archive_path.display());
    Ok(written)
}

/// Builds the archive on a worker thread so the caller's thread stays free.
pub(crate) fn build_archive_offloaded(
    selection: Vec<PathBuf>,
    archive_path: PathBuf,
    cancel: CancelToken,
) -> Result<usize, OpError> {
    std::thread::spawn(move || build_archive(&selection, &archive_path, &cancel))
        .join()
        .map_err(|_| OpError::Unexpected("archive worker panicked".to_string()))?
}
