//! Streams the working tree into a compressed archive.

use crate::error::SnapshotError;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Package `root` as gzip-compressed tar at `out_file`, then remove the
/// tree. Entry paths inside the archive are relative to `root`, so the
/// extracted layout mirrors the working directory. Non-regular entries
/// (symlinks, sockets) are not expected under `root` and are skipped with
/// a warning.
pub fn package_dir(root: &Path, out_file: &Path) -> Result<(), SnapshotError> {
    let file = fs::File::create(out_file)
        .map_err(|e| SnapshotError::PackagingFailed(format!("create {}: {e}", out_file.display())))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    append_dir(&mut builder, root, root)?;

    let encoder = builder
        .into_inner()
        .map_err(|e| SnapshotError::PackagingFailed(format!("finalize tar: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SnapshotError::PackagingFailed(format!("finalize gzip: {e}")))?;

    debug!(archive = %out_file.display(), "archive written, removing working tree");
    fs::remove_dir_all(root)?;
    Ok(())
}

fn append_dir<W: Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    dir: &Path,
) -> Result<(), SnapshotError> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| SnapshotError::PackagingFailed(format!("read {}: {e}", dir.display())))?
        .collect::<Result<_, _>>()
        .map_err(|e| SnapshotError::PackagingFailed(format!("read {}: {e}", dir.display())))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| SnapshotError::PackagingFailed(format!("stat {}: {e}", path.display())))?;
        if file_type.is_dir() {
            append_dir(builder, root, &path)?;
        } else if file_type.is_file() {
            let relative = path.strip_prefix(root).expect("entry under root");
            builder
                .append_path_with_name(&path, relative)
                .map_err(|e| {
                    SnapshotError::PackagingFailed(format!("append {}: {e}", path.display()))
                })?;
        } else {
            warn!(path = %path.display(), "skipping non-regular file");
        }
    }
    Ok(())
}
