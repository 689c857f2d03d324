//! The seed responder registry: an exact-path map from request path to the
//! seed (and response kind) that answers it.
//!
//! The map is built once during startup, then moved into the shared server
//! state and never modified again. Dispatch is an exact string match on the
//! request path; the metadata path is registered twice so trailing-slash
//! requests resolve to the same responder.

use crate::error::{AppError, AppResult};
use crate::seed::Seed;
use axum::body::Body;
use axum::http::{header, HeaderMap, Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Which of a seed's two responses a registered path serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Metadata,
    Tarball,
}

/// One registered path: the seed that owns it and the response kind.
#[derive(Clone)]
pub struct OverlayRoute {
    pub seed: Arc<Seed>,
    pub kind: OverlayKind,
}

/// Exact-path responder registry, consulted before falling back to the
/// pass-through proxy. Entries persist for the process lifetime.
#[derive(Default)]
pub struct OverlayMap {
    routes: HashMap<String, OverlayRoute>,
}

impl OverlayMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a seed's three paths: `/{name}`, `/{name}/`, and the tarball
    /// path. Both metadata variants resolve to the same responder.
    pub fn register(&mut self, seed: Seed) {
        let seed = Arc::new(seed);
        let metadata_route = seed.metadata_route();
        self.routes.insert(
            format!("{metadata_route}/"),
            OverlayRoute {
                seed: Arc::clone(&seed),
                kind: OverlayKind::Metadata,
            },
        );
        self.routes.insert(
            metadata_route,
            OverlayRoute {
                seed: Arc::clone(&seed),
                kind: OverlayKind::Metadata,
            },
        );
        self.routes.insert(
            seed.tarball_route(),
            OverlayRoute {
                seed,
                kind: OverlayKind::Tarball,
            },
        );
    }

    /// Exact-match lookup; no prefix or pattern matching.
    pub fn get(&self, path: &str) -> Option<&OverlayRoute> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Produce the response for a matched overlay path.
pub async fn respond(route: &OverlayRoute, headers: &HeaderMap) -> AppResult<Response<Body>> {
    match route.kind {
        OverlayKind::Metadata => metadata_response(&route.seed, headers),
        OverlayKind::Tarball => tarball_response(&route.seed).await,
    }
}

/// Serialize the merged document with `dist.tarball` resolved against the
/// request's Host header. Recomputed per request: the host can legitimately
/// differ between clients and must be reflected back so the follow-up
/// tarball fetch targets this proxy.
fn metadata_response(seed: &Seed, headers: &HeaderMap) -> AppResult<Response<Body>> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing Host header".to_string()))?;

    let body = serde_json::to_vec(&seed.metadata_for_host(host))?;
    debug!(package = %seed.name, host = %host, bytes = body.len(), "serving overlay metadata");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len() as u64)
        .body(Body::from(body))
        .map_err(|e| AppError::InternalError(format!("building metadata response: {e}")))
}

/// Stream the original tarball from disk. The file is re-read on every
/// request rather than cached, so arbitrarily large tarballs never pin
/// memory; Content-Length is the size stat taken at seeding time.
async fn tarball_response(seed: &Seed) -> AppResult<Response<Body>> {
    let file = File::open(&seed.tarball_path).await?;
    debug!(package = %seed.name, version = %seed.version, size = seed.size, "serving overlay tarball");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet")
        .header(header::CONTENT_LENGTH, seed.size)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalError(format!("building tarball response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn test_seed() -> Seed {
        Seed {
            tarball_path: PathBuf::from("/tmp/demo-1.0.0.tgz"),
            name: "demo".into(),
            version: "1.0.0".into(),
            shasum: "abc".into(),
            size: 10,
            document: json!({"name": "demo"}),
        }
    }

    #[test]
    fn test_register_adds_three_exact_paths() {
        let mut overlays = OverlayMap::new();
        overlays.register(test_seed());

        assert_eq!(overlays.len(), 3);
        assert!(overlays.get("/demo").is_some());
        assert!(overlays.get("/demo/").is_some());
        assert!(overlays.get("/demo/-/demo-1.0.0.tgz").is_some());
    }

    #[test]
    fn test_lookup_is_exact_not_prefix() {
        let mut overlays = OverlayMap::new();
        overlays.register(test_seed());

        assert!(overlays.get("/demo/1.0.0").is_none());
        assert!(overlays.get("/demo-other").is_none());
        assert!(overlays.get("demo").is_none());
    }

    #[test]
    fn test_slash_variants_share_one_seed() {
        let mut overlays = OverlayMap::new();
        overlays.register(test_seed());

        let bare = overlays.get("/demo").unwrap();
        let slashed = overlays.get("/demo/").unwrap();
        assert!(Arc::ptr_eq(&bare.seed, &slashed.seed));
        assert_eq!(bare.kind, OverlayKind::Metadata);
        assert_eq!(slashed.kind, OverlayKind::Metadata);
        assert_eq!(
            overlays.get("/demo/-/demo-1.0.0.tgz").unwrap().kind,
            OverlayKind::Tarball
        );
    }

    #[test]
    fn test_metadata_response_requires_host_header() {
        let seed = test_seed();
        let err = metadata_response(&seed, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
