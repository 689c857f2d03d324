//! Communication with the upstream registry.
//!
//! Two concerns live here: fetching full metadata documents during seeding,
//! and the transparent pass-through proxy used for every request that does
//! not match a seeded path.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, Response, StatusCode};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Configuration for the upstream registry connection.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream registry (no trailing slash)
    pub registry_url: String,
    /// Timeout for metadata fetches
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            registry_url: crate::config::DEFAULT_REGISTRY_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for UpstreamConfig {
    fn from(config: &Config) -> Self {
        Self {
            registry_url: config.registry_url.trim_end_matches('/').to_string(),
            timeout: config.upstream_timeout(),
        }
    }
}

/// Headers never forwarded in either direction.
const HOP_HEADERS: [HeaderName; 2] = [header::HOST, header::CONNECTION];

/// Request headers additionally stripped before forwarding, so the upstream
/// always answers with a full body instead of a conditional 304.
const CONDITIONAL_HEADERS: [HeaderName; 2] = [header::IF_NONE_MATCH, header::IF_MODIFIED_SINCE];

/// HTTP client for the upstream registry.
///
/// Shared across all request handlers and the seeding pipeline. Metadata
/// fetches carry a request timeout; pass-through proxying only bounds the
/// connection establishment, since response bodies may be arbitrarily large.
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> AppResult<Self> {
        // Reject malformed registry URLs up front rather than on first use.
        Url::parse(&config.registry_url).map_err(|e| {
            AppError::BadRequest(format!(
                "invalid registry URL {:?}: {e}",
                config.registry_url
            ))
        })?;

        let client = Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(concat!("npm-overlay-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn registry_url(&self) -> &str {
        &self.config.registry_url
    }

    /// Fetch the full metadata document for a package from the upstream.
    ///
    /// The body is buffered and parsed as JSON. Transport errors, non-2xx
    /// statuses (other than 404) and non-JSON bodies all propagate as
    /// upstream errors; seeding is never retried.
    ///
    /// A clean 404 means the package has never been published upstream, and
    /// yields an empty document so a brand-new package can still be seeded.
    pub async fn fetch_metadata(&self, package_name: &str) -> AppResult<Value> {
        let url = format!("{}/{}", self.config.registry_url, package_name);
        debug!(url = %url, "Fetching upstream metadata");

        let response = self
            .client
            .get(&url)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(package = %package_name, error = %e, "Failed to fetch upstream metadata");
                AppError::Upstream(format!("fetching metadata for {package_name}: {e}"))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            info!(package = %package_name, "Package unknown upstream, starting from an empty document");
            return Ok(empty_document(package_name));
        }
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "upstream returned {} for {package_name}",
                response.status()
            )));
        }

        let document = response.json().await.map_err(|e| {
            AppError::Upstream(format!("parsing upstream metadata for {package_name}: {e}"))
        })?;
        info!(package = %package_name, "Fetched upstream metadata");
        Ok(document)
    }

    /// Forward a request to the upstream registry and relay the response.
    ///
    /// Method, path, query, headers (hop-specific and conditional-cache
    /// headers stripped) and the request body stream all pass through
    /// unmodified; the upstream status, headers, and body stream are relayed
    /// verbatim. A transport failure is a terminal per-request error.
    pub async fn proxy(&self, request: Request) -> AppResult<Response<Body>> {
        let method = request.method().clone();
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let url = format!("{}{}", self.config.registry_url, path_and_query);

        let mut headers = HeaderMap::new();
        for (name, value) in request.headers() {
            if forwards_upstream(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        let body = reqwest::Body::wrap_stream(request.into_body().into_data_stream());
        let upstream_response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("forwarding to {url}: {e}")))?;

        let mut response = Response::builder().status(upstream_response.status());
        if let Some(response_headers) = response.headers_mut() {
            for (name, value) in upstream_response.headers() {
                if !HOP_HEADERS.contains(name) && name != header::TRANSFER_ENCODING {
                    response_headers.append(name.clone(), value.clone());
                }
            }
        }
        response
            .body(Body::from_stream(upstream_response.bytes_stream()))
            .map_err(|e| AppError::InternalError(format!("building proxied response: {e}")))
    }
}

fn forwards_upstream(name: &HeaderName) -> bool {
    !HOP_HEADERS.contains(name)
        && !CONDITIONAL_HEADERS.contains(name)
        && name != header::CONTENT_LENGTH
}

/// Metadata document for a package with no upstream history.
fn empty_document(package_name: &str) -> Value {
    json!({
        "_id": package_name,
        "name": package_name,
        "versions": {},
        "dist-tags": {},
        "time": {},
    })
}
