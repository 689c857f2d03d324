//! Content digest computation for package tarballs.
//!
//! npm records tarball checksums as SHA-1 in the `dist.shasum` metadata
//! field, so that is the algorithm used here. Files are hashed as a stream
//! of fixed-size chunks to keep memory bounded for arbitrarily large
//! tarballs.

use crate::error::AppResult;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the SHA-1 digest of a file as a lowercase hex string.
///
/// The file is read in chunks; any I/O error (missing file, read failure
/// mid-stream) propagates and fails the whole seeding step for that tarball.
pub async fn sha1_file(path: &Path) -> AppResult<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Calculate the SHA-1 hash of in-memory data as a lowercase hex string.
pub fn sha1_hash(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
