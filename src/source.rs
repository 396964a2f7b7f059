//! Turning a request into the two documents to compare.
//!
//! Uploads are written into a per-request temporary directory which is
//! removed when the [`SourcePair`] owning it is dropped, whatever happens
//! to the request afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{LoadError, SourceError};
use crate::loader::{self, ExternalRefs, RefBase};

pub const BASE_FIELD: &str = "base";
pub const REVISION_FIELD: &str = "revision";

const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";

/// Where a specification came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecOrigin {
    /// Uploaded content written to a request-scoped temporary file.
    Upload(PathBuf),
    /// Remote document fetched over HTTP.
    Remote(String),
    /// File on the local filesystem (command line use).
    Local(PathBuf),
}

impl fmt::Display for SpecOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecOrigin::Upload(path) | SpecOrigin::Local(path) => write!(f, "{}", path.display()),
            SpecOrigin::Remote(url) => f.write_str(url),
        }
    }
}

/// One specification document, as bytes plus its origin.
#[derive(Debug, Clone)]
pub struct SpecSource {
    origin: SpecOrigin,
    content: Vec<u8>,
}

impl SpecSource {
    /// Read a local file.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::FileNotFound` or `LoadError::ReadError`.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let content = loader::read_file(path)?;
        Ok(Self {
            origin: SpecOrigin::Local(path.to_path_buf()),
            content,
        })
    }

    /// Validate a reference and fetch the document behind it.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidUrl` for malformed references and a network
    /// error when the fetch fails.
    pub fn from_url(reference: &str) -> Result<Self, LoadError> {
        let url = loader::parse_reference(reference)?;
        let content = loader::fetch(&url)?;
        Ok(Self {
            origin: SpecOrigin::Remote(url),
            content,
        })
    }

    /// Load from a URL when the location looks like one, from disk otherwise.
    ///
    /// # Errors
    ///
    /// See [`SpecSource::from_url`] and [`SpecSource::from_path`].
    pub fn from_location(location: &str) -> Result<Self, LoadError> {
        if loader::is_url(location) {
            Self::from_url(location)
        } else {
            Self::from_path(Path::new(location))
        }
    }

    pub fn origin(&self) -> &SpecOrigin {
        &self.origin
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Base against which relative `$ref`s are resolved.
    pub fn ref_base(&self) -> RefBase {
        match &self.origin {
            SpecOrigin::Upload(path) | SpecOrigin::Local(path) => RefBase::Dir(
                path.parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
            ),
            SpecOrigin::Remote(url) => RefBase::Url(url.clone()),
        }
    }

    /// Uploaded content stands alone; only referenced documents may pull in others.
    pub fn external_refs(&self) -> ExternalRefs {
        match self.origin {
            SpecOrigin::Upload(_) => ExternalRefs::Deny,
            SpecOrigin::Remote(_) | SpecOrigin::Local(_) => ExternalRefs::Follow,
        }
    }
}

/// The base and revision documents of one request.
///
/// Owns the temporary directory of uploaded content, if any.
#[derive(Debug)]
pub struct SourcePair {
    pub base: SpecSource,
    pub revision: SpecSource,
    workspace: Option<TempDir>,
}

impl SourcePair {
    /// Pair two sources that need no temporary storage.
    pub fn new(base: SpecSource, revision: SpecSource) -> Self {
        Self {
            base,
            revision,
            workspace: None,
        }
    }

    /// Directory holding uploaded content; removed when the pair is dropped.
    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_ref().map(TempDir::path)
    }
}

/// Supported upload encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Multipart,
    UrlEncoded,
}

impl UploadKind {
    /// Classify a `Content-Type` header value.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::UnsupportedContentType` for anything but
    /// multipart form data or url-encoded forms.
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, SourceError> {
        let value = content_type.unwrap_or_default();
        if value.starts_with(MULTIPART_FORM_DATA) {
            Ok(UploadKind::Multipart)
        } else if value
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim() == FORM_URL_ENCODED)
        {
            Ok(UploadKind::UrlEncoded)
        } else {
            Err(SourceError::UnsupportedContentType(value.to_string()))
        }
    }
}

/// Raw `base` and `revision` form fields of an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadFields {
    base: Option<Vec<u8>>,
    revision: Option<Vec<u8>>,
}

impl UploadFields {
    /// Append bytes received for a form field; unrelated fields are ignored.
    ///
    /// Repeated parts with the same name are concatenated in order.
    pub fn push(&mut self, name: &str, bytes: &[u8]) {
        let slot = match name {
            BASE_FIELD => &mut self.base,
            REVISION_FIELD => &mut self.revision,
            _ => return,
        };
        slot.get_or_insert_with(Vec::new).extend_from_slice(bytes);
    }
}

/// Read the upload fields out of a multipart or url-encoded request body.
///
/// # Errors
///
/// Returns `SourceError::UnsupportedContentType` or
/// `SourceError::MalformedForm`.
pub async fn read_upload(request: Request) -> Result<UploadFields, SourceError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let kind = UploadKind::from_content_type(content_type.as_deref())?;

    let mut fields = UploadFields::default();
    match kind {
        UploadKind::Multipart => {
            let mut multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| SourceError::MalformedForm(e.body_text()))?;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| SourceError::MalformedForm(e.body_text()))?
            {
                let name = field.name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| SourceError::MalformedForm(e.body_text()))?;
                fields.push(&name, &bytes);
            }
        }
        UploadKind::UrlEncoded => {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
                .await
                .map_err(|e| SourceError::MalformedForm(e.body_text()))?;
            for (name, value) in pairs {
                fields.push(&name, value.as_bytes());
            }
        }
    }
    Ok(fields)
}

/// Write uploaded fields into a fresh temporary directory.
///
/// # Errors
///
/// Returns `SourceError::MissingField` / `SourceError::EmptyField` for
/// unusable input and `SourceError::Storage` when the directory or files
/// cannot be created.
pub fn resolve_from_upload(fields: UploadFields) -> Result<SourcePair, SourceError> {
    let base = required_field(fields.base, BASE_FIELD)?;
    let revision = required_field(fields.revision, REVISION_FIELD)?;

    let workspace = tempfile::Builder::new()
        .prefix("specdiff-")
        .tempdir()
        .map_err(|source| SourceError::Storage { source })?;
    debug!(dir = %workspace.path().display(), "created upload workspace");

    let base = write_upload(workspace.path(), BASE_FIELD, base)?;
    let revision = write_upload(workspace.path(), REVISION_FIELD, revision)?;

    Ok(SourcePair {
        base,
        revision,
        workspace: Some(workspace),
    })
}

/// Fetch the two referenced documents.
///
/// # Errors
///
/// Returns `SourceError::MissingField` when a reference is absent or blank,
/// and a load error when it is malformed or cannot be fetched.
pub fn resolve_from_uri(
    base: Option<&str>,
    revision: Option<&str>,
) -> Result<SourcePair, SourceError> {
    let base = base.filter(|s| !s.trim().is_empty()).ok_or(SourceError::MissingField(BASE_FIELD))?;
    let revision = revision
        .filter(|s| !s.trim().is_empty())
        .ok_or(SourceError::MissingField(REVISION_FIELD))?;

    let base = fetch_reference(base, BASE_FIELD)?;
    let revision = fetch_reference(revision, REVISION_FIELD)?;
    Ok(SourcePair::new(base, revision))
}

fn fetch_reference(reference: &str, field: &'static str) -> Result<SpecSource, SourceError> {
    let source = SpecSource::from_url(reference).map_err(|e| {
        info!("failed to load {} spec from '{}' with '{}'", field, reference, e);
        e
    })?;
    if source.content.is_empty() {
        return Err(SourceError::EmptyField(field));
    }
    Ok(source)
}

fn required_field(value: Option<Vec<u8>>, field: &'static str) -> Result<Vec<u8>, SourceError> {
    match value {
        None => Err(SourceError::MissingField(field)),
        Some(bytes) if bytes.is_empty() => Err(SourceError::EmptyField(field)),
        Some(bytes) => Ok(bytes),
    }
}

fn write_upload(dir: &Path, name: &str, content: Vec<u8>) -> Result<SpecSource, SourceError> {
    let path = dir.join(name);
    std::fs::write(&path, &content).map_err(|source| SourceError::Storage { source })?;
    Ok(SpecSource {
        origin: SpecOrigin::Upload(path),
        content,
    })
}
