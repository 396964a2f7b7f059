//! Specification loading from various sources.
//!
//! Handles reading documents from files and HTTP URLs, parsing YAML or JSON,
//! checking the OpenAPI document shape and inlining external `$ref`s.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::error::LoadError;
use crate::types::json_type_name;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Where relative `$ref`s of a document are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefBase {
    /// Directory containing the document.
    Dir(PathBuf),
    /// URL the document was fetched from.
    Url(String),
}

/// Whether a document may pull in other documents through `$ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalRefs {
    Deny,
    Follow,
}

/// Read the raw bytes of a file.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::ReadError` if it can't be read.
pub fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Fetch a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the server
/// answers with a non-success status.
#[cfg(feature = "remote")]
pub fn fetch(url: &str) -> Result<Vec<u8>, LoadError> {
    let network_error = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network_error)?;

    let response = client.get(url).send().map_err(network_error)?;

    // Check for HTTP errors before reading the body
    let response = response.error_for_status().map_err(network_error)?;

    response
        .bytes()
        .map(|bytes| bytes.to_vec())
        .map_err(network_error)
}

/// Fetching is unavailable without the `remote` feature.
#[cfg(not(feature = "remote"))]
pub fn fetch(url: &str) -> Result<Vec<u8>, LoadError> {
    Err(LoadError::RemoteDisabled {
        url: url.to_string(),
    })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Validate a remote document reference.
///
/// # Errors
///
/// Returns `LoadError::InvalidUrl` unless the reference is an absolute
/// http(s) URL with a host.
pub fn parse_reference(reference: &str) -> Result<String, LoadError> {
    let trimmed = reference.trim();
    if !is_url(trimmed) {
        return Err(LoadError::InvalidUrl {
            url: reference.to_string(),
            message: "expected an http or https URL".to_string(),
        });
    }

    #[cfg(feature = "remote")]
    reqwest::Url::parse(trimmed).map_err(|e| LoadError::InvalidUrl {
        url: reference.to_string(),
        message: e.to_string(),
    })?;

    Ok(trimmed.to_string())
}

/// Parse YAML or JSON bytes into a document tree.
///
/// Only syntax is checked here; see [`validate_document`] for the shape.
///
/// # Errors
///
/// Returns `LoadError::EmptyDocument` for blank input and
/// `LoadError::InvalidSyntax` when the bytes are neither YAML nor JSON.
pub fn parse_document(content: &[u8], origin: &str) -> Result<Value, LoadError> {
    let trimmed = content.trim_ascii_start();
    if trimmed.is_empty() {
        return Err(LoadError::EmptyDocument {
            origin: origin.to_string(),
        });
    }

    // JSON may be indented with tabs, which YAML rejects
    if matches!(trimmed.first(), Some(b'{') | Some(b'[')) {
        if let Ok(value) = serde_json::from_slice::<Value>(trimmed) {
            return Ok(value);
        }
    }

    let yaml: serde_yaml::Value = serde_yaml::from_slice(content)
        .map_err(|source| LoadError::InvalidSyntax { source })?;
    if yaml.is_null() {
        return Err(LoadError::EmptyDocument {
            origin: origin.to_string(),
        });
    }
    yaml_to_json(yaml)
}

fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, LoadError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut obj = Map::new();
            for (key, val) in mapping {
                obj.insert(yaml_key(key)?, yaml_to_json(val)?);
            }
            Value::Object(obj)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// YAML allows non-string keys; responses are commonly keyed by bare `200`.
fn yaml_key(key: serde_yaml::Value) -> Result<String, LoadError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        other => Err(LoadError::InvalidDocument {
            message: format!("unsupported mapping key: {:?}", other),
        }),
    }
}

fn document_shape() -> Value {
    json!({
        "type": "object",
        "required": ["openapi", "info"],
        "properties": {
            "openapi": { "type": "string", "pattern": "^3\\." },
            "info": {
                "type": "object",
                "required": ["title", "version"]
            },
            "paths": { "type": "object" },
            "components": { "type": "object" }
        }
    })
}

/// Check that a parsed tree has the shape of an OpenAPI 3.x document.
///
/// # Errors
///
/// Returns `LoadError::InvalidDocument` listing every violation.
pub fn validate_document(document: &Value) -> Result<(), LoadError> {
    if !document.is_object() {
        return Err(LoadError::InvalidDocument {
            message: format!("expected object, got {}", json_type_name(document)),
        });
    }

    let validator =
        jsonschema::validator_for(&document_shape()).map_err(|e| LoadError::InvalidDocument {
            message: e.to_string(),
        })?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{}: {}", e.instance_path, e))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LoadError::InvalidDocument {
            message: errors.join("; "),
        })
    }
}

/// Look up an internal reference (e.g., "#/components/schemas/Pet").
pub fn lookup_ref<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    root.pointer(reference.trim_start_matches('#'))
}

/// Navigate a JSON Pointer fragment (e.g., "#/components/schemas/Pet").
///
/// Returns a copy of the value at the given JSON Pointer path within the
/// document. The fragment should start with '#'.
pub fn navigate_fragment(document: &Value, fragment: &str) -> Result<Value, LoadError> {
    lookup_ref(document, fragment)
        .cloned()
        .ok_or_else(|| LoadError::UnresolvedRef {
            reference: fragment.to_string(),
            message: "fragment not found".to_string(),
        })
}

/// Load a complete specification: parse, check the shape, verify the
/// document's own internal `$ref`s resolve, then inline external `$ref`s.
///
/// # Errors
///
/// Any [`LoadError`]; all of them are caused by the document itself or by
/// the documents it references.
pub fn load_spec(
    content: &[u8],
    origin: &str,
    base: &RefBase,
    external: ExternalRefs,
) -> Result<Value, LoadError> {
    let mut document = parse_document(content, origin)?;
    validate_document(&document)?;
    check_internal_refs(&document, &document)?;
    bundle_refs(&mut document, base, external)?;
    Ok(document)
}

/// Recursively resolve and inline external `$ref` pointers.
///
/// Walks the document tree, finds `$ref` values pointing to other
/// documents, loads them, and replaces the `$ref` with the loaded content.
/// Internal refs (`#/...`) in the root document are left for the comparator.
/// Internal refs in loaded external documents are resolved against that
/// document; a ref back into a schema that is still being expanded is left
/// as written. Self-root refs (`$ref: "#"`) are left as-is.
///
/// # Errors
///
/// Returns `LoadError::ExternalRefNotAllowed` on the first external ref when
/// `external` is [`ExternalRefs::Deny`], and load errors from referenced
/// documents otherwise.
pub fn bundle_refs(
    document: &mut Value,
    base: &RefBase,
    external: ExternalRefs,
) -> Result<(), LoadError> {
    bundle_refs_inner(document, base, None, external, &mut HashSet::new())
}

fn bundle_refs_inner(
    value: &mut Value,
    base: &RefBase,
    file_root: Option<&Value>, // Root of external document for resolving internal refs
    external: ExternalRefs,
    visited: &mut HashSet<String>,
) -> Result<(), LoadError> {
    match value {
        Value::Object(obj) => {
            if let Some(ref_val) = obj.get("$ref").and_then(|v| v.as_str()) {
                let ref_val = ref_val.to_string();
                if ref_val.starts_with('#') {
                    // Only resolve when inside an external document; the root
                    // document keeps its internal refs
                    if ref_val != "#" {
                        if let Some(root) = file_root {
                            let mut target = navigate_fragment(root, &ref_val)?;
                            let visit_key = format!("{:?}|{}", base, ref_val);
                            // Recursive schema: the enclosing expansion already
                            // holds the target, so the ref stays as written.
                            if !visited.insert(visit_key.clone()) {
                                return Ok(());
                            }
                            bundle_refs_inner(&mut target, base, file_root, external, visited)?;
                            visited.remove(&visit_key);
                            inline(obj, target);
                            return Ok(());
                        }
                    }
                } else {
                    if external == ExternalRefs::Deny {
                        return Err(LoadError::ExternalRefNotAllowed { reference: ref_val });
                    }

                    let (location, fragment) = match ref_val.find('#') {
                        Some(idx) => (&ref_val[..idx], Some(&ref_val[idx..])),
                        None => (ref_val.as_str(), None),
                    };

                    let target_base = resolve_location(base, location)?;
                    let visit_key = format!("{:?}|{}", target_base, fragment.unwrap_or(""));
                    if visited.contains(&visit_key) {
                        return Err(LoadError::UnresolvedRef {
                            reference: ref_val.clone(),
                            message: "circular reference".to_string(),
                        });
                    }

                    // Loaded document becomes the new file_root for internal refs
                    let loaded = load_location(&target_base)?;
                    let mut target = match fragment {
                        Some(frag) => navigate_fragment(&loaded, frag)?,
                        None => loaded.clone(),
                    };

                    visited.insert(visit_key.clone());
                    let nested_base = parent_base(&target_base);
                    bundle_refs_inner(&mut target, &nested_base, Some(&loaded), external, visited)?;
                    visited.remove(&visit_key);

                    inline(obj, target);
                    return Ok(());
                }
            }

            for child in obj.values_mut() {
                bundle_refs_inner(child, base, file_root, external, visited)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                bundle_refs_inner(item, base, file_root, external, visited)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace a `$ref` object with the referenced content, keeping siblings.
fn inline(obj: &mut Map<String, Value>, target: Value) {
    obj.remove("$ref");
    if let Value::Object(target_obj) = target {
        for (k, v) in target_obj {
            obj.entry(k).or_insert(v);
        }
    }
}

/// Resolve the document part of a `$ref` against the referring document.
fn resolve_location(base: &RefBase, location: &str) -> Result<RefBase, LoadError> {
    if is_url(location) {
        return Ok(RefBase::Url(location.to_string()));
    }
    Ok(match base {
        RefBase::Dir(dir) => RefBase::Dir(dir.join(location)),
        RefBase::Url(url) => RefBase::Url(join_url(url, location)?),
    })
}

/// Base for refs found inside a loaded document: its directory or its URL.
fn parent_base(location: &RefBase) -> RefBase {
    match location {
        RefBase::Dir(path) => RefBase::Dir(
            path.parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        ),
        RefBase::Url(url) => RefBase::Url(url.clone()),
    }
}

fn load_location(location: &RefBase) -> Result<Value, LoadError> {
    match location {
        RefBase::Dir(path) => {
            let content = read_file(path)?;
            parse_document(&content, &path.display().to_string())
        }
        RefBase::Url(url) => {
            let content = fetch(url)?;
            parse_document(&content, url)
        }
    }
}

/// Join a relative reference onto the URL of the referring document.
#[cfg(feature = "remote")]
fn join_url(base: &str, reference: &str) -> Result<String, LoadError> {
    reqwest::Url::parse(base)
        .and_then(|url| url.join(reference))
        .map(|url| url.to_string())
        .map_err(|e| LoadError::InvalidUrl {
            url: reference.to_string(),
            message: e.to_string(),
        })
}

#[cfg(not(feature = "remote"))]
fn join_url(base: &str, reference: &str) -> Result<String, LoadError> {
    Err(LoadError::RemoteDisabled {
        url: format!("{} ({})", reference, base),
    })
}

/// Verify every internal `$ref` in the document points at something.
fn check_internal_refs(value: &Value, root: &Value) -> Result<(), LoadError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_val)) = map.get("$ref") {
                if ref_val.starts_with('#') && ref_val != "#" && lookup_ref(root, ref_val).is_none()
                {
                    return Err(LoadError::UnresolvedRef {
                        reference: ref_val.clone(),
                        message: "anchor not found".to_string(),
                    });
                }
            }
            for child in map.values() {
                check_internal_refs(child, root)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                check_internal_refs(item, root)?;
            }
        }
        _ => {}
    }
    Ok(())
}
