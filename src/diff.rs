//! Structural difference between two OpenAPI documents.
//!
//! The tree only records what changed. Every collection is ordered
//! (`BTreeMap` or a sorted `Vec`) so serializing the same tree always
//! produces the same bytes.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::config::ComparisonConfig;
use crate::loader::lookup_ref;
use crate::types::{display_value, Side, EXTENSION_PREFIX, OPERATION_METHODS, SUNSET_EXTENSION};

/// Longest `$ref` chain (or `allOf` nesting) followed before giving up.
const MAX_REF_HOPS: usize = 32;

static EMPTY_SCHEMA: Value = Value::Null;

/// Everything that differs between a base and a revision document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffTree {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<EndpointsDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoDiff>,
    #[serde(skip_serializing_if = "PathsDiff::is_empty")]
    pub paths: PathsDiff,
}

impl DiffTree {
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_none() && self.info.is_none() && self.paths.is_empty()
    }
}

/// Flat summary of added, deleted and modified operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointsDiff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<Endpoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<Endpoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modified: Vec<Endpoint>,
}

impl EndpointsDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfoDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ValueDiff>,
}

impl InfoDiff {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.version.is_none() && self.description.is_none()
    }
}

/// Old and new value of a scalar (or opaque) field; `null` means absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueDiff {
    pub from: Value,
    pub to: Value,
}

impl ValueDiff {
    fn between(from: Option<&Value>, to: Option<&Value>) -> Option<Self> {
        let from = from.cloned().unwrap_or(Value::Null);
        let to = to.cloned().unwrap_or(Value::Null);
        (from != to).then_some(ValueDiff { from, to })
    }

    fn flag(from: bool, to: bool) -> Option<Self> {
        (from != to).then(|| ValueDiff {
            from: Value::Bool(from),
            to: Value::Bool(to),
        })
    }
}

/// Deprecation state of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lifecycle {
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunset: Option<String>,
}

impl Lifecycle {
    pub fn of(operation: &Value) -> Self {
        Self {
            deprecated: operation
                .get("deprecated")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            sunset: operation
                .get(SUNSET_EXTENSION)
                .filter(|v| !v.is_null())
                .map(display_value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathsDiff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    /// Removed paths with the lifecycle of each operation they held.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub deleted: BTreeMap<String, BTreeMap<String, Lifecycle>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modified: BTreeMap<String, PathDiff>,
}

impl PathsDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ValueDiff>,
    #[serde(skip_serializing_if = "OperationsDiff::is_empty")]
    pub operations: OperationsDiff,
}

impl PathDiff {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.description.is_none() && self.operations.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationsDiff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub deleted: BTreeMap<String, Lifecycle>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modified: BTreeMap<String, OperationDiff>,
}

impl OperationsDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunset: Option<ValueDiff>,
    #[serde(skip_serializing_if = "ParametersDiff::is_empty")]
    pub parameters: ParametersDiff,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyDiff>,
    #[serde(skip_serializing_if = "ResponsesDiff::is_empty")]
    pub responses: ResponsesDiff,
    /// Deprecation state in the revision, needed to judge new deprecations.
    #[serde(skip)]
    pub revision: Lifecycle,
}

impl OperationDiff {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.description.is_none()
            && self.operation_id.is_none()
            && self.deprecated.is_none()
            && self.sunset.is_none()
            && self.parameters.is_empty()
            && self.request_body.is_none()
            && self.responses.is_empty()
    }
}

/// Parameters keyed by `"<in> <name>"`, e.g. `"query limit"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParametersDiff {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub added: BTreeMap<String, ParamInfo>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub deleted: BTreeMap<String, ParamInfo>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modified: BTreeMap<String, ParameterDiff>,
}

impl ParametersDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Split a parameter key into its location and name.
pub fn split_param_key(key: &str) -> (&str, &str) {
    key.split_once(' ').unwrap_or(("", key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamInfo {
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaDiff>,
}

impl ParameterDiff {
    pub fn is_empty(&self) -> bool {
        self.required.is_none()
            && self.description.is_none()
            && self.example.is_none()
            && self.schema.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestBodyDiff {
    Added { required: bool },
    Deleted,
    Modified(BodyDiff),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BodyDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ValueDiff>,
    #[serde(skip_serializing_if = "ContentDiff::is_empty")]
    pub content: ContentDiff,
}

impl BodyDiff {
    pub fn is_empty(&self) -> bool {
        self.required.is_none() && self.description.is_none() && self.content.is_empty()
    }
}

/// Media types of a request body or response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentDiff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modified: BTreeMap<String, MediaTypeDiff>,
}

impl ContentDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaTypeDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<ValueDiff>,
}

impl MediaTypeDiff {
    pub fn is_empty(&self) -> bool {
        self.schema.is_none() && self.example.is_none() && self.examples.is_none()
    }
}

/// Responses keyed by status code (`"200"`, `"4XX"`, `"default"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponsesDiff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modified: BTreeMap<String, ResponseDiff>,
}

impl ResponsesDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ValueDiff>,
    #[serde(skip_serializing_if = "ContentDiff::is_empty")]
    pub content: ContentDiff,
}

impl ResponseDiff {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.content.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDiff {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ValueDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<ValueDiff>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<EnumDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<RequiredDiff>,
    #[serde(skip_serializing_if = "PropertiesDiff::is_empty")]
    pub properties: PropertiesDiff,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaDiff>>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.type_.is_none()
            && self.format.is_none()
            && self.description.is_none()
            && self.example.is_none()
            && self.enum_.is_none()
            && self.required.is_none()
            && self.properties.is_empty()
            && self.items.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnumDiff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequiredDiff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertiesDiff {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub added: BTreeMap<String, PropertyInfo>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub deleted: BTreeMap<String, PropertyInfo>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modified: BTreeMap<String, SchemaDiff>,
}

impl PropertiesDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropertyInfo {
    pub required: bool,
}

/// Replace every `{param}` segment with `{}` so renamed path parameters
/// still match.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_param = false;
    for c in path.chars() {
        match c {
            '{' => {
                in_param = true;
                out.push_str("{}");
            }
            '}' if in_param => in_param = false,
            _ if in_param => {}
            _ => out.push(c),
        }
    }
    out
}

/// Compare two loaded documents.
///
/// Internal `$ref`s are followed while comparing; a pair of references
/// already being compared higher up the stack is treated as unchanged.
pub fn compute(config: &ComparisonConfig, base: &Value, revision: &Value) -> DiffTree {
    let mut differ = Differ {
        config,
        base,
        revision,
        visiting: Vec::new(),
    };
    differ.tree()
}

/// Follow internal `$ref` chains to the referenced node.
fn deref<'v>(root: &'v Value, mut node: &'v Value) -> &'v Value {
    for _ in 0..MAX_REF_HOPS {
        match node.get("$ref").and_then(Value::as_str) {
            Some(reference) if reference.starts_with('#') => match lookup_ref(root, reference) {
                Some(target) => node = target,
                None => break,
            },
            _ => break,
        }
    }
    node
}

fn entries(value: Option<&Value>) -> BTreeMap<&str, &Value> {
    value
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.as_str(), v)).collect())
        .unwrap_or_default()
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn enum_diff(base: Option<&Value>, revision: Option<&Value>) -> Option<EnumDiff> {
    let base = base.and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
    let revision = revision
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let diff = EnumDiff {
        added: revision
            .iter()
            .filter(|v| !base.contains(v))
            .cloned()
            .collect(),
        deleted: base
            .iter()
            .filter(|v| !revision.contains(v))
            .cloned()
            .collect(),
    };
    (!diff.added.is_empty() || !diff.deleted.is_empty()).then_some(diff)
}

struct PathEntry<'a> {
    path: String,
    item: &'a Value,
}

struct Differ<'a> {
    config: &'a ComparisonConfig,
    base: &'a Value,
    revision: &'a Value,
    visiting: Vec<(String, String)>,
}

impl<'a> Differ<'a> {
    fn root(&self, side: Side) -> &'a Value {
        match side {
            Side::Base => self.base,
            Side::Revision => self.revision,
        }
    }

    fn text_diff(&self, base: Option<&Value>, revision: Option<&Value>) -> Option<ValueDiff> {
        if self.config.exclude_description {
            return None;
        }
        ValueDiff::between(base, revision)
    }

    fn example_diff(&self, base: Option<&Value>, revision: Option<&Value>) -> Option<ValueDiff> {
        if self.config.exclude_examples {
            return None;
        }
        ValueDiff::between(base, revision)
    }

    fn tree(&mut self) -> DiffTree {
        let base_paths = self.collect_paths(Side::Base);
        let revision_paths = self.collect_paths(Side::Revision);

        let mut paths = PathsDiff::default();
        let mut endpoints = EndpointsDiff::default();

        for (key, revision) in &revision_paths {
            if base_paths.contains_key(key) {
                continue;
            }
            paths.added.push(revision.path.clone());
            for method in self.operations(revision.item).into_keys() {
                endpoints.added.push(Endpoint {
                    method,
                    path: revision.path.clone(),
                });
            }
        }

        for (key, base) in &base_paths {
            let Some(revision) = revision_paths.get(key) else {
                let operations: BTreeMap<String, Lifecycle> = self
                    .operations(base.item)
                    .into_iter()
                    .map(|(method, op)| (method, Lifecycle::of(op)))
                    .collect();
                for method in operations.keys() {
                    endpoints.deleted.push(Endpoint {
                        method: method.clone(),
                        path: base.path.clone(),
                    });
                }
                paths.deleted.insert(base.path.clone(), operations);
                continue;
            };

            let diff = self.path_diff(base.item, revision.item);
            if diff.is_empty() {
                continue;
            }
            let endpoint = |method: &String| Endpoint {
                method: method.clone(),
                path: revision.path.clone(),
            };
            endpoints.added.extend(diff.operations.added.iter().map(endpoint));
            endpoints.modified.extend(diff.operations.modified.keys().map(endpoint));
            endpoints.deleted.extend(diff.operations.deleted.keys().map(|method| Endpoint {
                method: method.clone(),
                path: base.path.clone(),
            }));
            paths.modified.insert(revision.path.clone(), diff);
        }

        paths.added.sort();
        endpoints.added.sort();
        endpoints.deleted.sort();
        endpoints.modified.sort();

        DiffTree {
            endpoints: (!self.config.exclude_endpoints && !endpoints.is_empty()).then_some(endpoints),
            info: Some(self.info_diff()).filter(|info| !info.is_empty()),
            paths,
        }
    }

    fn info_diff(&self) -> InfoDiff {
        let base = self.base.get("info").unwrap_or(&EMPTY_SCHEMA);
        let revision = self.revision.get("info").unwrap_or(&EMPTY_SCHEMA);
        InfoDiff {
            title: ValueDiff::between(base.get("title"), revision.get("title")),
            version: ValueDiff::between(base.get("version"), revision.get("version")),
            description: self.text_diff(base.get("description"), revision.get("description")),
        }
    }

    /// Path items after rewriting and filtering, keyed by normalized path.
    fn collect_paths(&self, side: Side) -> BTreeMap<String, PathEntry<'a>> {
        let root = self.root(side);
        let Some(paths) = root.get("paths").and_then(Value::as_object) else {
            return BTreeMap::new();
        };
        paths
            .iter()
            .filter_map(|(raw, item)| {
                let path = match side {
                    Side::Base => self.config.base_path(raw),
                    Side::Revision => self.config.revision_path(raw),
                };
                let item = deref(root, item);
                if !self.config.matches_path(&path) || self.excluded_by_extension(item) {
                    return None;
                }
                Some((normalize_path(&path), PathEntry { path, item }))
            })
            .collect()
    }

    fn excluded_by_extension(&self, node: &Value) -> bool {
        node.as_object().is_some_and(|map| {
            self.config.excludes_extensions(
                map.keys()
                    .map(String::as_str)
                    .filter(|key| key.starts_with(EXTENSION_PREFIX)),
            )
        })
    }

    /// Operations of a path item keyed by upper-case method.
    fn operations(&self, item: &'a Value) -> BTreeMap<String, &'a Value> {
        OPERATION_METHODS
            .iter()
            .filter_map(|method| {
                let operation = item.get(*method).filter(|op| op.is_object())?;
                if self.excluded_by_extension(operation) {
                    return None;
                }
                Some((method.to_uppercase(), operation))
            })
            .collect()
    }

    fn path_diff(&mut self, base: &'a Value, revision: &'a Value) -> PathDiff {
        let base_ops = self.operations(base);
        let revision_ops = self.operations(revision);

        let mut operations = OperationsDiff {
            added: revision_ops
                .keys()
                .filter(|method| !base_ops.contains_key(*method))
                .cloned()
                .collect(),
            ..OperationsDiff::default()
        };
        for (method, &base_op) in &base_ops {
            match revision_ops.get(method).copied() {
                None => {
                    operations
                        .deleted
                        .insert(method.clone(), Lifecycle::of(base_op));
                }
                Some(revision_op) => {
                    let diff = self.operation_diff((base, base_op), (revision, revision_op));
                    if !diff.is_empty() {
                        operations.modified.insert(method.clone(), diff);
                    }
                }
            }
        }

        PathDiff {
            summary: self.text_diff(base.get("summary"), revision.get("summary")),
            description: self.text_diff(base.get("description"), revision.get("description")),
            operations,
        }
    }

    fn operation_diff(
        &mut self,
        (base_item, base): (&'a Value, &'a Value),
        (revision_item, revision): (&'a Value, &'a Value),
    ) -> OperationDiff {
        let base_lifecycle = Lifecycle::of(base);
        let revision_lifecycle = Lifecycle::of(revision);

        let sunset = (base_lifecycle.sunset != revision_lifecycle.sunset).then(|| ValueDiff {
            from: base_lifecycle.sunset.clone().map_or(Value::Null, Value::String),
            to: revision_lifecycle
                .sunset
                .clone()
                .map_or(Value::Null, Value::String),
        });

        OperationDiff {
            summary: self.text_diff(base.get("summary"), revision.get("summary")),
            description: self.text_diff(base.get("description"), revision.get("description")),
            operation_id: ValueDiff::between(base.get("operationId"), revision.get("operationId")),
            deprecated: ValueDiff::flag(base_lifecycle.deprecated, revision_lifecycle.deprecated),
            sunset,
            parameters: self.parameters_diff(
                self.parameters(Side::Base, base_item, base),
                self.parameters(Side::Revision, revision_item, revision),
            ),
            request_body: self.request_body_diff(base.get("requestBody"), revision.get("requestBody")),
            responses: self.responses_diff(base.get("responses"), revision.get("responses")),
            revision: revision_lifecycle,
        }
    }

    /// Path-level and operation-level parameters; the operation wins on
    /// a location and name clash.
    fn parameters(
        &self,
        side: Side,
        item: &'a Value,
        operation: &'a Value,
    ) -> BTreeMap<String, &'a Value> {
        let root = self.root(side);
        let mut params = BTreeMap::new();
        for list in [item.get("parameters"), operation.get("parameters")]
            .into_iter()
            .flatten()
            .filter_map(Value::as_array)
        {
            for param in list {
                let param = deref(root, param);
                let location = param.get("in").and_then(Value::as_str);
                let name = param.get("name").and_then(Value::as_str);
                if let (Some(location), Some(name)) = (location, name) {
                    params.insert(format!("{} {}", location, name), param);
                }
            }
        }
        params
    }

    fn parameters_diff(
        &mut self,
        base: BTreeMap<String, &'a Value>,
        revision: BTreeMap<String, &'a Value>,
    ) -> ParametersDiff {
        let mut diff = ParametersDiff::default();
        for (key, param) in &revision {
            if !base.contains_key(key) {
                diff.added.insert(key.clone(), param_info(param));
            }
        }
        for (key, &base_param) in &base {
            let Some(&revision_param) = revision.get(key) else {
                diff.deleted.insert(key.clone(), param_info(base_param));
                continue;
            };
            let param = ParameterDiff {
                required: ValueDiff::flag(
                    param_info(base_param).required,
                    param_info(revision_param).required,
                ),
                description: self.text_diff(
                    base_param.get("description"),
                    revision_param.get("description"),
                ),
                example: self.example_diff(base_param.get("example"), revision_param.get("example")),
                schema: self.schema_diff(base_param.get("schema"), revision_param.get("schema")),
            };
            if !param.is_empty() {
                diff.modified.insert(key.clone(), param);
            }
        }
        diff
    }

    fn request_body_diff(
        &mut self,
        base: Option<&'a Value>,
        revision: Option<&'a Value>,
    ) -> Option<RequestBodyDiff> {
        let base = base.map(|body| deref(self.base, body));
        let revision = revision.map(|body| deref(self.revision, body));
        match (base, revision) {
            (None, None) => None,
            (None, Some(revision)) => Some(RequestBodyDiff::Added {
                required: flag(revision, "required"),
            }),
            (Some(_), None) => Some(RequestBodyDiff::Deleted),
            (Some(base), Some(revision)) => {
                let body = BodyDiff {
                    required: ValueDiff::flag(flag(base, "required"), flag(revision, "required")),
                    description: self.text_diff(base.get("description"), revision.get("description")),
                    content: self.content_diff(base.get("content"), revision.get("content")),
                };
                (!body.is_empty()).then_some(RequestBodyDiff::Modified(body))
            }
        }
    }

    fn responses_diff(&mut self, base: Option<&'a Value>, revision: Option<&'a Value>) -> ResponsesDiff {
        let base = entries(base);
        let revision = entries(revision);

        let mut diff = ResponsesDiff {
            added: revision
                .keys()
                .filter(|status| !base.contains_key(*status))
                .map(|status| status.to_string())
                .collect(),
            deleted: base
                .keys()
                .filter(|status| !revision.contains_key(*status))
                .map(|status| status.to_string())
                .collect(),
            ..ResponsesDiff::default()
        };
        for (status, &base_response) in &base {
            let Some(&revision_response) = revision.get(status) else {
                continue;
            };
            let base_response = deref(self.base, base_response);
            let revision_response = deref(self.revision, revision_response);
            let response = ResponseDiff {
                description: self.text_diff(
                    base_response.get("description"),
                    revision_response.get("description"),
                ),
                content: self.content_diff(base_response.get("content"), revision_response.get("content")),
            };
            if !response.is_empty() {
                diff.modified.insert(status.to_string(), response);
            }
        }
        diff
    }

    fn content_diff(&mut self, base: Option<&'a Value>, revision: Option<&'a Value>) -> ContentDiff {
        let base = entries(base);
        let revision = entries(revision);

        let mut diff = ContentDiff {
            added: revision
                .keys()
                .filter(|media| !base.contains_key(*media))
                .map(|media| media.to_string())
                .collect(),
            deleted: base
                .keys()
                .filter(|media| !revision.contains_key(*media))
                .map(|media| media.to_string())
                .collect(),
            ..ContentDiff::default()
        };
        for (media, &base_media) in &base {
            let Some(&revision_media) = revision.get(media) else {
                continue;
            };
            let media_diff = MediaTypeDiff {
                schema: self.schema_diff(base_media.get("schema"), revision_media.get("schema")),
                example: self.example_diff(base_media.get("example"), revision_media.get("example")),
                examples: self.example_diff(base_media.get("examples"), revision_media.get("examples")),
            };
            if !media_diff.is_empty() {
                diff.modified.insert(media.to_string(), media_diff);
            }
        }
        diff
    }

    fn schema_diff(&mut self, base: Option<&'a Value>, revision: Option<&'a Value>) -> Option<SchemaDiff> {
        if base.is_none() && revision.is_none() {
            return None;
        }
        let base = base.unwrap_or(&EMPTY_SCHEMA);
        let revision = revision.unwrap_or(&EMPTY_SCHEMA);

        let guard = ref_pair(base, revision);
        if let Some(pair) = &guard {
            if self.visiting.contains(pair) {
                return None;
            }
            self.visiting.push(pair.clone());
        }

        let diff = self.schema_fields(deref(self.base, base), deref(self.revision, revision));

        if guard.is_some() {
            self.visiting.pop();
        }
        (!diff.is_empty()).then_some(diff)
    }

    fn schema_fields(&mut self, base: &'a Value, revision: &'a Value) -> SchemaDiff {
        let (base_props, base_required) = self.object_shape(Side::Base, base);
        let (revision_props, revision_required) = self.object_shape(Side::Revision, revision);

        let mut properties = PropertiesDiff::default();
        for name in revision_props.keys() {
            if !base_props.contains_key(name) {
                properties.added.insert(
                    name.to_string(),
                    PropertyInfo {
                        required: revision_required.contains(name),
                    },
                );
            }
        }
        for (name, &base_prop) in &base_props {
            match revision_props.get(name).copied() {
                None => {
                    properties.deleted.insert(
                        name.to_string(),
                        PropertyInfo {
                            required: base_required.contains(name),
                        },
                    );
                }
                Some(revision_prop) => {
                    if let Some(diff) = self.schema_diff(Some(base_prop), Some(revision_prop)) {
                        properties.modified.insert(name.to_string(), diff);
                    }
                }
            }
        }

        let required = RequiredDiff {
            added: revision_required
                .difference(&base_required)
                .map(|name| name.to_string())
                .collect(),
            deleted: base_required
                .difference(&revision_required)
                .map(|name| name.to_string())
                .collect(),
        };

        SchemaDiff {
            type_: ValueDiff::between(base.get("type"), revision.get("type")),
            format: ValueDiff::between(base.get("format"), revision.get("format")),
            description: self.text_diff(base.get("description"), revision.get("description")),
            example: self.example_diff(base.get("example"), revision.get("example")),
            enum_: enum_diff(base.get("enum"), revision.get("enum")),
            required: (!required.added.is_empty() || !required.deleted.is_empty()).then_some(required),
            properties,
            items: self
                .schema_diff(base.get("items"), revision.get("items"))
                .map(Box::new),
        }
    }

    /// Properties and required names of a schema, merged across `allOf`.
    fn object_shape(
        &self,
        side: Side,
        schema: &'a Value,
    ) -> (BTreeMap<&'a str, &'a Value>, BTreeSet<&'a str>) {
        let mut properties = BTreeMap::new();
        let mut required = BTreeSet::new();
        self.collect_shape(side, schema, &mut properties, &mut required, 0);
        (properties, required)
    }

    fn collect_shape(
        &self,
        side: Side,
        schema: &'a Value,
        properties: &mut BTreeMap<&'a str, &'a Value>,
        required: &mut BTreeSet<&'a str>,
        depth: usize,
    ) {
        if depth > MAX_REF_HOPS {
            return;
        }
        let schema = deref(self.root(side), schema);
        if let Some(map) = schema.get("properties").and_then(Value::as_object) {
            properties.extend(map.iter().map(|(name, prop)| (name.as_str(), prop)));
        }
        if let Some(names) = schema.get("required").and_then(Value::as_array) {
            required.extend(names.iter().filter_map(Value::as_str));
        }
        if let Some(members) = schema.get("allOf").and_then(Value::as_array) {
            for member in members {
                self.collect_shape(side, member, properties, required, depth + 1);
            }
        }
    }
}

fn param_info(param: &Value) -> ParamInfo {
    ParamInfo {
        required: flag(param, "required")
            || param.get("in").and_then(Value::as_str) == Some("path"),
    }
}

fn ref_pair(base: &Value, revision: &Value) -> Option<(String, String)> {
    let base_ref = base.get("$ref").and_then(Value::as_str);
    let revision_ref = revision.get("$ref").and_then(Value::as_str);
    if base_ref.is_none() && revision_ref.is_none() {
        return None;
    }
    Some((
        base_ref.unwrap_or_default().to_string(),
        revision_ref.unwrap_or_default().to_string(),
    ))
}
