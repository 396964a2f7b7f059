//! OpenAPI diff service
//!
//! Compares two OpenAPI 3.x documents and reports the result as a raw
//! structural diff, a list of breaking changes, or a full changelog.
//!
//! # Example
//!
//! ```
//! use specdiff::{check, compute, CheckContext, ComparisonConfig, Level};
//! use serde_json::json;
//!
//! let base = json!({
//!     "openapi": "3.0.3",
//!     "info": { "title": "Pets", "version": "1.0.0" },
//!     "paths": {
//!         "/pets": { "get": { "responses": { "200": { "description": "ok" } } } }
//!     }
//! });
//! let revision = json!({
//!     "openapi": "3.0.3",
//!     "info": { "title": "Pets", "version": "1.0.0" },
//!     "paths": {}
//! });
//!
//! let tree = compute(&ComparisonConfig::default(), &base, &revision);
//! let changes = check(&tree, &CheckContext::now(0));
//!
//! // Removing a path without deprecating it first is breaking
//! assert_eq!(changes.max_level(), Some(Level::Error));
//! ```
//!
//! # Operations
//!
//! | Operation | Route | Keeps |
//! |-----------|-------|-------|
//! | diff | `/tenants/:tenant_id/diff` | the diff tree, unclassified |
//! | breaking changes | `/tenants/:tenant_id/breaking-changes` | `warning` and `error` |
//! | changelog | `/tenants/:tenant_id/changelog` | every level |
//!
//! Documents are uploaded (`POST`, multipart or url-encoded fields `base` and
//! `revision`) or referenced (`GET ?base=<url>&revision=<url>`).

pub mod checker;
mod classify;
mod comparator;
pub mod config;
pub mod diff;
mod error;
mod handler;
mod loader;
mod localize;
pub mod logging;
mod render;
mod server;
mod source;
mod telemetry;
mod types;

pub use checker::{check, parse_sunset, Change, ChangeLocation, ChangeSet, CheckContext, Rule};
pub use classify::{apply_floor, classify_result, Operation, Report};
pub use comparator::{Comparator, OpenApiComparator};
pub use config::{ComparisonConfig, QueryParams};
pub use diff::{compute, DiffTree};
pub use error::{LoadError, PipelineError, RenderError, SourceError};
pub use handler::{Caller, Handler, Rendered};
pub use loader::{load_spec, parse_document, ExternalRefs, RefBase};
pub use localize::{negotiate_language, Localizer, DEFAULT_LANGUAGE, SUPPORTED_LANGUAGES};
pub use render::{MediaType, OutputRenderer, RenderRequest};
pub use server::{router, run as serve, ServerConfig, REQUEST_TIMEOUT};
pub use source::{resolve_from_upload, resolve_from_uri, SourcePair, SpecOrigin, SpecSource};
pub use telemetry::{
    Disabled, HttpCollector, TelemetryError, TelemetryEvent, TelemetrySender,
};
pub use types::{Level, Side};
