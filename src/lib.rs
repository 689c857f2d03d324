//! # npm Overlay Proxy
//!
//! A transparent npm registry proxy that serves locally-built tarballs in
//! place of upstream content for an explicitly seeded set of packages, and
//! forwards everything else to the upstream registry unchanged.
//!
//! ## Key Modules
//!
//! - [`config`]: resolved runtime configuration
//! - [`error`]: error types and standardized HTTP error responses
//! - [`digest`]: streaming SHA-1 tarball digests
//! - [`manifest`]: `package.json` extraction from .tgz archives
//! - [`upstream`]: upstream metadata fetches and pass-through proxying
//! - [`seed`]: the seed assembly pipeline and document merge
//! - [`overlay`]: the exact-path responder registry
//! - [`server`]: HTTP dispatch and the serve loop

pub mod config;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod overlay;
pub mod seed;
pub mod server;
pub mod upstream;

// Re-export key types for convenience
pub use config::Config;
pub use error::{ApiErrorResponse, AppError, AppResult, ErrorCode};
pub use overlay::{OverlayKind, OverlayMap};
pub use seed::Seed;
pub use server::{app_router, run_server, AppState};
pub use upstream::{UpstreamClient, UpstreamConfig};
