//! Package manifest extraction from gzip-compressed tar archives.
//!
//! npm tarballs place the package descriptor at `<top-dir>/package.json`,
//! conventionally `package/package.json`. The extractor scans entries in
//! archive order and returns the first entry sitting directly under a single
//! top-level directory with the manifest filename, parsed as JSON. The scan
//! stops as soon as the manifest is read.
//!
//! `flate2` and `tar` are synchronous, so the decode runs on the blocking
//! thread pool.

use crate::error::{AppError, AppResult};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path};
use tar::Archive;
use tracing::debug;

const MANIFEST_FILENAME: &str = "package.json";

/// Extract and parse the `package.json` manifest embedded in a .tgz archive.
///
/// Fails with an archive error if the stream ends without a manifest entry
/// or the gzip/tar stream is corrupt, and with a JSON error if the entry's
/// content is not valid JSON.
pub async fn extract_package_json(path: &Path) -> AppResult<Value> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_manifest(&path))
        .await
        .map_err(|e| AppError::InternalError(format!("manifest extraction task failed: {e}")))?
}

fn read_manifest(path: &Path) -> AppResult<Value> {
    let file = File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let entries = archive
        .entries()
        .map_err(|e| AppError::BadArchive(format!("reading {}: {e}", path.display())))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| AppError::BadArchive(format!("reading {}: {e}", path.display())))?;
        let entry_path = entry
            .path()
            .map_err(|e| AppError::BadArchive(format!("entry path in {}: {e}", path.display())))?
            .into_owned();
        if !is_manifest_entry(&entry_path) {
            continue;
        }

        debug!(entry = %entry_path.display(), archive = %path.display(), "found manifest entry");
        let mut raw = String::new();
        entry
            .read_to_string(&mut raw)
            .map_err(|e| AppError::BadArchive(format!("reading manifest entry: {e}")))?;
        return Ok(serde_json::from_str(&raw)?);
    }

    Err(AppError::BadArchive(format!(
        "no {} entry found in {}",
        MANIFEST_FILENAME,
        path.display()
    )))
}

/// An entry is the manifest if it sits directly under a single top-level
/// directory and is named `package.json`. Leading `./` components are
/// ignored.
fn is_manifest_entry(path: &Path) -> bool {
    let components: Vec<_> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    match components.as_slice() {
        [Component::Normal(_), Component::Normal(file)] => {
            file.to_str() == Some(MANIFEST_FILENAME)
        }
        _ => false,
    }
}
