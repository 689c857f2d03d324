//! Seed assembly: turning a local tarball into a served package overlay.
//!
//! A [`Seed`] is one local package override. Assembling it runs the digest
//! computation, the size stat, and the manifest-then-upstream-fetch chain
//! concurrently; only once every input has succeeded is the merged metadata
//! document built. The merge produces a new owned document, never mutating
//! shared JSON.

use crate::digest;
use crate::error::{AppError, AppResult};
use crate::manifest;
use crate::overlay::OverlayMap;
use crate::upstream::UpstreamClient;
use chrono::Utc;
use futures_util::future;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// One locally-provided package override, immutable after assembly.
///
/// The merged document's `dist.tarball` field is left as a placeholder: the
/// real URL depends on the `Host` header of each incoming request and is
/// resolved per request by [`Seed::metadata_for_host`].
#[derive(Debug, Clone)]
pub struct Seed {
    /// Path of the tarball on disk, re-read on every tarball request
    pub tarball_path: PathBuf,
    /// Package name from the embedded manifest
    pub name: String,
    /// Package version from the embedded manifest
    pub version: String,
    /// Lowercase hex SHA-1 digest of the tarball bytes
    pub shasum: String,
    /// Tarball size in bytes, served as Content-Length
    pub size: u64,
    /// Merged upstream metadata document
    pub document: Value,
}

impl Seed {
    /// Request path serving the metadata document (`/{name}`).
    pub fn metadata_route(&self) -> String {
        format!("/{}", self.name)
    }

    /// Request path serving the tarball bytes
    /// (`/{name}/-/{name}-{version}.tgz`).
    pub fn tarball_route(&self) -> String {
        format!("/{0}/-/{0}-{1}.tgz", self.name, self.version)
    }

    /// The merged document with `dist.tarball` resolved against the host the
    /// client addressed us as, so its follow-up tarball fetch targets this
    /// proxy regardless of which address it connected through.
    pub fn metadata_for_host(&self, host: &str) -> Value {
        let mut document = self.document.clone();
        document["versions"][self.version.as_str()]["dist"]["tarball"] =
            json!(format!("http://{}{}", host, self.tarball_route()));
        document
    }
}

/// Assemble a seed from one tarball path.
///
/// Digest, size stat, and the manifest/upstream chain run concurrently and
/// must all succeed before any document is constructed; a failure in any one
/// of them fails the seed with nothing partially built.
pub async fn assemble(path: &Path, upstream: &UpstreamClient) -> AppResult<Seed> {
    let shasum_task = digest::sha1_file(path);
    let size_task = async {
        let metadata = tokio::fs::metadata(path).await?;
        Ok::<u64, AppError>(metadata.len())
    };
    // The upstream fetch needs the manifest's name, so it is sequenced after
    // extraction but still overlaps digest and stat work.
    let document_task = async {
        let manifest = manifest::extract_package_json(path).await?;
        let name = required_field(&manifest, "name", path)?;
        let document = upstream.fetch_metadata(&name).await?;
        Ok::<(Value, Value), AppError>((manifest, document))
    };

    let (shasum, size, (manifest, document)) =
        tokio::try_join!(shasum_task, size_task, document_task)?;

    let name = required_field(&manifest, "name", path)?;
    let version = required_field(&manifest, "version", path)?;
    if !document.is_object() {
        return Err(AppError::Upstream(format!(
            "upstream document for {name} is not a JSON object"
        )));
    }

    let document = merge_document(document, manifest, &name, &version, &shasum);
    info!(package = %name, version = %version, shasum = %shasum, "registered local overlay");

    Ok(Seed {
        tarball_path: path.to_path_buf(),
        name,
        version,
        shasum,
        size,
        document,
    })
}

/// Assemble every tarball concurrently and build the overlay map.
///
/// Fail-fast: any seed failure aborts the whole startup before the server
/// binds its listening socket.
pub async fn assemble_all(paths: &[PathBuf], upstream: &UpstreamClient) -> AppResult<OverlayMap> {
    let seeds =
        future::try_join_all(paths.iter().map(|path| assemble(path, upstream))).await?;

    let mut overlays = OverlayMap::new();
    for seed in seeds {
        overlays.register(seed);
    }
    Ok(overlays)
}

/// Splice a local manifest into an upstream metadata document.
///
/// Builds the merged view: the local version unconditionally overwrites any
/// upstream entry for the same version, `dist-tags.latest` is repointed at
/// it, and the time map is stamped with the current timestamp. The caller
/// guarantees `document` is a JSON object.
fn merge_document(
    mut document: Value,
    mut pkg_manifest: Value,
    name: &str,
    version: &str,
    shasum: &str,
) -> Value {
    if let Some(previous) = document["versions"].get(version) {
        let upstream_shasum = previous["dist"]["shasum"].as_str().unwrap_or("unknown");
        info!(package = %name, version = %version, upstream_shasum = %upstream_shasum,
            "shadowing upstream version with local tarball");
    }

    pkg_manifest["dist"] = json!({
        "shasum": shasum,
        // resolved per request from the client's Host header
        "tarball": "",
    });

    let now = Utc::now().to_rfc3339();
    document["versions"][version] = pkg_manifest;
    document["dist-tags"]["latest"] = json!(version);
    document["time"][version] = json!(now);
    document["time"]["modified"] = json!(now);
    document
}

fn required_field(pkg_manifest: &Value, field: &str, path: &Path) -> AppResult<String> {
    pkg_manifest[field]
        .as_str()
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "manifest in {} is missing a {field:?} string",
                path.display()
            ))
        })
}
