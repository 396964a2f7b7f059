//! Error types for loading, source resolution, rendering and the request pipeline.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors while loading a specification document.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("remote documents are not supported by this build: {url}")]
    RemoteDisabled { url: String },

    // Input errors (exit code 2)
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("empty document: {origin}")]
    EmptyDocument { origin: String },

    #[error("invalid YAML or JSON: {source}")]
    InvalidSyntax {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid specification document: {message}")]
    InvalidDocument { message: String },

    #[error("external reference not allowed: {reference}")]
    ExternalRefNotAllowed { reference: String },

    #[error("cannot resolve reference {reference}: {message}")]
    UnresolvedRef { reference: String, message: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while turning a request into a pair of specification sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),

    #[error("malformed form data: {0}")]
    MalformedForm(String),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("empty field '{0}'")]
    EmptyField(&'static str),

    #[error("failed to allocate temporary storage: {source}")]
    Storage {
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl SourceError {
    /// True when the caller sent something unusable, false for server-side faults.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SourceError::Storage { .. })
    }
}

/// Errors while serializing a report.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure of a single request, classified by who is at fault.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("pipeline task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// True for client-input failures (4xx), false for internal ones (5xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            PipelineError::Source(e) => e.is_client_error(),
            PipelineError::Load(_) => true,
            PipelineError::Render(_) | PipelineError::Task(_) => false,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Load(e) | PipelineError::Source(SourceError::Load(e)) => e.exit_code(),
            PipelineError::Source(SourceError::Storage { .. }) | PipelineError::Task(_) => 3,
            PipelineError::Source(_) | PipelineError::Render(_) => 2,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        // Detail stays in the server log; the body is always empty.
        if self.is_client_error() {
            tracing::info!(error = %self, "rejecting request");
        } else {
            tracing::error!(error = %self, "request failed");
        }
        self.status_code().into_response()
    }
}
