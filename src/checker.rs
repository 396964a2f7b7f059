//! Compatibility rules evaluated against a [`DiffTree`].
//!
//! Each rule has a fixed id (also the message catalog key) and a fixed
//! severity. Changes are reported in the order the tree is walked: paths
//! added, paths removed, then each modified path's operations.

use chrono::{Days, NaiveDate, Utc};

use crate::diff::{
    split_param_key, ContentDiff, DiffTree, Lifecycle, OperationDiff, ParametersDiff,
    RequestBodyDiff, ResponsesDiff, SchemaDiff, ValueDiff,
};
use crate::types::{display_value, Level, Side};

/// A compatibility rule: message key plus severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub id: &'static str,
    pub level: Level,
}

const fn rule(id: &'static str, level: Level) -> Rule {
    Rule { id, level }
}

pub const API_PATH_ADDED: Rule = rule("api-path-added", Level::Info);
pub const ENDPOINT_ADDED: Rule = rule("endpoint-added", Level::Info);
pub const API_PATH_REMOVED_WITHOUT_DEPRECATION: Rule =
    rule("api-path-removed-without-deprecation", Level::Error);
pub const API_REMOVED_WITHOUT_DEPRECATION: Rule =
    rule("api-removed-without-deprecation", Level::Error);
pub const API_PATH_REMOVED_BEFORE_SUNSET: Rule = rule("api-path-removed-before-sunset", Level::Error);
pub const API_REMOVED_BEFORE_SUNSET: Rule = rule("api-removed-before-sunset", Level::Error);
pub const API_PATH_SUNSET_REACHED: Rule = rule("api-path-sunset-reached", Level::Info);
pub const API_REMOVED_AFTER_SUNSET: Rule = rule("api-removed-after-sunset", Level::Info);
pub const API_DEPRECATED: Rule = rule("api-deprecated", Level::Info);
pub const API_REACTIVATED: Rule = rule("api-reactivated", Level::Info);
pub const API_DEPRECATED_SUNSET_MISSING: Rule = rule("api-deprecated-sunset-missing", Level::Error);
pub const API_SUNSET_DATE_TOO_SMALL: Rule = rule("api-sunset-date-too-small", Level::Error);
pub const API_OPERATION_ID_UPDATED: Rule = rule("api-operation-id-updated", Level::Info);

pub const NEW_REQUIRED_REQUEST_PARAMETER: Rule = rule("new-required-request-parameter", Level::Error);
pub const NEW_OPTIONAL_REQUEST_PARAMETER: Rule = rule("new-optional-request-parameter", Level::Info);
pub const REQUEST_PARAMETER_REMOVED: Rule = rule("request-parameter-removed", Level::Warn);
pub const REQUEST_PARAMETER_BECAME_REQUIRED: Rule =
    rule("request-parameter-became-required", Level::Error);
pub const REQUEST_PARAMETER_BECAME_OPTIONAL: Rule =
    rule("request-parameter-became-optional", Level::Info);
pub const REQUEST_PARAMETER_TYPE_CHANGED: Rule = rule("request-parameter-type-changed", Level::Error);
pub const REQUEST_PARAMETER_ENUM_VALUE_REMOVED: Rule =
    rule("request-parameter-enum-value-removed", Level::Error);

pub const REQUEST_BODY_ADDED_REQUIRED: Rule = rule("request-body-added-required", Level::Error);
pub const REQUEST_BODY_ADDED_OPTIONAL: Rule = rule("request-body-added-optional", Level::Info);
pub const REQUEST_BODY_REMOVED: Rule = rule("request-body-removed", Level::Warn);
pub const REQUEST_BODY_BECAME_REQUIRED: Rule = rule("request-body-became-required", Level::Error);
pub const REQUEST_BODY_BECAME_OPTIONAL: Rule = rule("request-body-became-optional", Level::Info);
pub const REQUEST_BODY_MEDIA_TYPE_ADDED: Rule = rule("request-body-media-type-added", Level::Info);
pub const REQUEST_BODY_MEDIA_TYPE_REMOVED: Rule =
    rule("request-body-media-type-removed", Level::Error);

pub const NEW_REQUIRED_REQUEST_PROPERTY: Rule = rule("new-required-request-property", Level::Error);
pub const NEW_OPTIONAL_REQUEST_PROPERTY: Rule = rule("new-optional-request-property", Level::Info);
pub const REQUEST_PROPERTY_REMOVED: Rule = rule("request-property-removed", Level::Warn);
pub const REQUEST_PROPERTY_BECAME_REQUIRED: Rule =
    rule("request-property-became-required", Level::Error);
pub const REQUEST_PROPERTY_BECAME_OPTIONAL: Rule =
    rule("request-property-became-optional", Level::Info);
pub const REQUEST_PROPERTY_TYPE_CHANGED: Rule = rule("request-property-type-changed", Level::Error);
pub const REQUEST_PROPERTY_ENUM_VALUE_REMOVED: Rule =
    rule("request-property-enum-value-removed", Level::Error);
pub const REQUEST_PROPERTY_ENUM_VALUE_ADDED: Rule =
    rule("request-property-enum-value-added", Level::Info);

pub const RESPONSE_SUCCESS_STATUS_ADDED: Rule = rule("response-success-status-added", Level::Info);
pub const RESPONSE_SUCCESS_STATUS_REMOVED: Rule =
    rule("response-success-status-removed", Level::Error);
pub const RESPONSE_NON_SUCCESS_STATUS_REMOVED: Rule =
    rule("response-non-success-status-removed", Level::Warn);
pub const RESPONSE_MEDIA_TYPE_ADDED: Rule = rule("response-media-type-added", Level::Info);
pub const RESPONSE_MEDIA_TYPE_REMOVED: Rule = rule("response-media-type-removed", Level::Error);
pub const RESPONSE_REQUIRED_PROPERTY_REMOVED: Rule =
    rule("response-required-property-removed", Level::Error);
pub const RESPONSE_OPTIONAL_PROPERTY_REMOVED: Rule =
    rule("response-optional-property-removed", Level::Warn);
pub const RESPONSE_PROPERTY_ADDED: Rule = rule("response-property-added", Level::Info);
pub const RESPONSE_PROPERTY_BECAME_OPTIONAL: Rule =
    rule("response-property-became-optional", Level::Error);
pub const RESPONSE_PROPERTY_BECAME_REQUIRED: Rule =
    rule("response-property-became-required", Level::Info);
pub const RESPONSE_PROPERTY_TYPE_CHANGED: Rule = rule("response-property-type-changed", Level::Error);
pub const RESPONSE_PROPERTY_ENUM_VALUE_ADDED: Rule =
    rule("response-property-enum-value-added", Level::Warn);

/// Every rule the checker can emit.
pub const RULES: &[Rule] = &[
    API_PATH_ADDED,
    ENDPOINT_ADDED,
    API_PATH_REMOVED_WITHOUT_DEPRECATION,
    API_REMOVED_WITHOUT_DEPRECATION,
    API_PATH_REMOVED_BEFORE_SUNSET,
    API_REMOVED_BEFORE_SUNSET,
    API_PATH_SUNSET_REACHED,
    API_REMOVED_AFTER_SUNSET,
    API_DEPRECATED,
    API_REACTIVATED,
    API_DEPRECATED_SUNSET_MISSING,
    API_SUNSET_DATE_TOO_SMALL,
    API_OPERATION_ID_UPDATED,
    NEW_REQUIRED_REQUEST_PARAMETER,
    NEW_OPTIONAL_REQUEST_PARAMETER,
    REQUEST_PARAMETER_REMOVED,
    REQUEST_PARAMETER_BECAME_REQUIRED,
    REQUEST_PARAMETER_BECAME_OPTIONAL,
    REQUEST_PARAMETER_TYPE_CHANGED,
    REQUEST_PARAMETER_ENUM_VALUE_REMOVED,
    REQUEST_BODY_ADDED_REQUIRED,
    REQUEST_BODY_ADDED_OPTIONAL,
    REQUEST_BODY_REMOVED,
    REQUEST_BODY_BECAME_REQUIRED,
    REQUEST_BODY_BECAME_OPTIONAL,
    REQUEST_BODY_MEDIA_TYPE_ADDED,
    REQUEST_BODY_MEDIA_TYPE_REMOVED,
    NEW_REQUIRED_REQUEST_PROPERTY,
    NEW_OPTIONAL_REQUEST_PROPERTY,
    REQUEST_PROPERTY_REMOVED,
    REQUEST_PROPERTY_BECAME_REQUIRED,
    REQUEST_PROPERTY_BECAME_OPTIONAL,
    REQUEST_PROPERTY_TYPE_CHANGED,
    REQUEST_PROPERTY_ENUM_VALUE_REMOVED,
    REQUEST_PROPERTY_ENUM_VALUE_ADDED,
    RESPONSE_SUCCESS_STATUS_ADDED,
    RESPONSE_SUCCESS_STATUS_REMOVED,
    RESPONSE_NON_SUCCESS_STATUS_REMOVED,
    RESPONSE_MEDIA_TYPE_ADDED,
    RESPONSE_MEDIA_TYPE_REMOVED,
    RESPONSE_REQUIRED_PROPERTY_REMOVED,
    RESPONSE_OPTIONAL_PROPERTY_REMOVED,
    RESPONSE_PROPERTY_ADDED,
    RESPONSE_PROPERTY_BECAME_OPTIONAL,
    RESPONSE_PROPERTY_BECAME_REQUIRED,
    RESPONSE_PROPERTY_TYPE_CHANGED,
    RESPONSE_PROPERTY_ENUM_VALUE_ADDED,
];

/// Where in the documents a change was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLocation {
    pub path: String,
    /// Upper-case HTTP method.
    pub method: String,
    pub side: Side,
}

/// One classified finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub id: &'static str,
    pub level: Level,
    pub location: ChangeLocation,
    /// Positional message arguments (`{0}`, `{1}`, ...).
    pub args: Vec<String>,
}

/// Findings in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(Vec<Change>);

impl ChangeSet {
    pub fn new(changes: Vec<Change>) -> Self {
        Self(changes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.0.iter()
    }

    /// Keep only changes at or above `floor`, preserving order.
    pub fn at_least(self, floor: Level) -> Self {
        Self(self.0.into_iter().filter(|c| c.level >= floor).collect())
    }

    /// Highest severity present, if any.
    pub fn max_level(&self) -> Option<Level> {
        self.0.iter().map(|c| c.level).max()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Inputs to classification besides the tree itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckContext {
    /// Minimal days between deprecation and sunset; 0 disables the check.
    pub deprecation_days: u32,
    pub today: NaiveDate,
}

impl CheckContext {
    pub fn new(deprecation_days: u32, today: NaiveDate) -> Self {
        Self {
            deprecation_days,
            today,
        }
    }

    /// Context dated at the current UTC day.
    pub fn now(deprecation_days: u32) -> Self {
        Self::new(deprecation_days, Utc::now().date_naive())
    }

    fn earliest_sunset(&self) -> NaiveDate {
        self.today
            .checked_add_days(Days::new(u64::from(self.deprecation_days)))
            .unwrap_or(NaiveDate::MAX)
    }
}

/// Evaluate every rule against the tree.
pub fn check(tree: &DiffTree, ctx: &CheckContext) -> ChangeSet {
    let mut checker = Checker {
        ctx,
        changes: Vec::new(),
    };
    checker.walk(tree);
    ChangeSet(checker.changes)
}

/// Parse an `x-sunset` value.
pub fn parse_sunset(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn is_success(status: &str) -> bool {
    status.starts_with('2')
}

fn property_label(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn diff_args(diff: &ValueDiff) -> [String; 2] {
    [display_value(&diff.from), display_value(&diff.to)]
}

struct Checker<'c> {
    ctx: &'c CheckContext,
    changes: Vec<Change>,
}

/// Operation a change is attributed to.
#[derive(Clone, Copy)]
struct At<'p> {
    path: &'p str,
    method: &'p str,
}

impl Checker<'_> {
    fn emit(&mut self, rule: Rule, at: At<'_>, side: Side, args: Vec<String>) {
        self.changes.push(Change {
            id: rule.id,
            level: rule.level,
            location: ChangeLocation {
                path: at.path.to_string(),
                method: at.method.to_string(),
                side,
            },
            args,
        });
    }

    fn walk(&mut self, tree: &DiffTree) {
        // Added paths carry no per-operation detail in the tree; the
        // endpoint summary does, but it may be switched off.
        for path in &tree.paths.added {
            let methods: Vec<&str> = tree
                .endpoints
                .iter()
                .flat_map(|e| e.added.iter())
                .filter(|e| &e.path == path)
                .map(|e| e.method.as_str())
                .collect();
            if methods.is_empty() {
                self.emit(API_PATH_ADDED, At { path, method: "" }, Side::Revision, Vec::new());
            }
            for method in methods {
                self.emit(API_PATH_ADDED, At { path, method }, Side::Revision, Vec::new());
            }
        }

        for (path, operations) in &tree.paths.deleted {
            for (method, lifecycle) in operations {
                let rule = self.removal(
                    lifecycle,
                    [
                        API_PATH_REMOVED_WITHOUT_DEPRECATION,
                        API_PATH_REMOVED_BEFORE_SUNSET,
                        API_PATH_SUNSET_REACHED,
                    ],
                );
                let args = removal_args(rule, lifecycle);
                self.emit(rule, At { path, method }, Side::Base, args);
            }
        }

        for (path, path_diff) in &tree.paths.modified {
            let operations = &path_diff.operations;
            for method in &operations.added {
                self.emit(ENDPOINT_ADDED, At { path, method }, Side::Revision, Vec::new());
            }
            for (method, lifecycle) in &operations.deleted {
                let rule = self.removal(
                    lifecycle,
                    [
                        API_REMOVED_WITHOUT_DEPRECATION,
                        API_REMOVED_BEFORE_SUNSET,
                        API_REMOVED_AFTER_SUNSET,
                    ],
                );
                let args = removal_args(rule, lifecycle);
                self.emit(rule, At { path, method }, Side::Base, args);
            }
            for (method, operation) in &operations.modified {
                self.operation(At { path, method }, operation);
            }
        }
    }

    /// Pick among `[without deprecation, before sunset, after sunset]`.
    fn removal(&self, lifecycle: &Lifecycle, [without, before, after]: [Rule; 3]) -> Rule {
        if !lifecycle.deprecated {
            return without;
        }
        match lifecycle.sunset.as_deref().and_then(parse_sunset) {
            Some(sunset) if sunset <= self.ctx.today => after,
            Some(_) => before,
            None if self.ctx.deprecation_days == 0 => after,
            None => before,
        }
    }

    fn operation(&mut self, at: At<'_>, op: &OperationDiff) {
        if let Some(deprecated) = &op.deprecated {
            if deprecated.to.as_bool() == Some(true) {
                self.deprecation(at, &op.revision);
            } else {
                self.emit(API_REACTIVATED, at, Side::Revision, Vec::new());
            }
        }
        if let Some(operation_id) = &op.operation_id {
            self.emit(
                API_OPERATION_ID_UPDATED,
                at,
                Side::Revision,
                diff_args(operation_id).to_vec(),
            );
        }
        self.parameters(at, &op.parameters);
        if let Some(body) = &op.request_body {
            self.request_body(at, body);
        }
        self.responses(at, &op.responses);
    }

    fn deprecation(&mut self, at: At<'_>, revision: &Lifecycle) {
        let sunset = revision.sunset.clone().unwrap_or_else(|| "none".to_string());
        self.emit(API_DEPRECATED, at, Side::Revision, vec![sunset.clone()]);

        if self.ctx.deprecation_days == 0 {
            return;
        }
        match revision.sunset.as_deref().and_then(parse_sunset) {
            None => self.emit(API_DEPRECATED_SUNSET_MISSING, at, Side::Revision, Vec::new()),
            Some(date) => {
                let earliest = self.ctx.earliest_sunset();
                if date < earliest {
                    self.emit(
                        API_SUNSET_DATE_TOO_SMALL,
                        at,
                        Side::Revision,
                        vec![sunset, earliest.format("%Y-%m-%d").to_string()],
                    );
                }
            }
        }
    }

    fn parameters(&mut self, at: At<'_>, params: &ParametersDiff) {
        for (key, info) in &params.added {
            let rule = if info.required {
                NEW_REQUIRED_REQUEST_PARAMETER
            } else {
                NEW_OPTIONAL_REQUEST_PARAMETER
            };
            self.emit(rule, at, Side::Revision, param_args(key));
        }
        for key in params.deleted.keys() {
            self.emit(REQUEST_PARAMETER_REMOVED, at, Side::Base, param_args(key));
        }
        for (key, param) in &params.modified {
            if let Some(required) = &param.required {
                let rule = if required.to.as_bool() == Some(true) {
                    REQUEST_PARAMETER_BECAME_REQUIRED
                } else {
                    REQUEST_PARAMETER_BECAME_OPTIONAL
                };
                self.emit(rule, at, Side::Revision, param_args(key));
            }
            let Some(schema) = &param.schema else {
                continue;
            };
            if let Some(type_) = &schema.type_ {
                let mut args = param_args(key);
                args.extend(diff_args(type_));
                self.emit(REQUEST_PARAMETER_TYPE_CHANGED, at, Side::Revision, args);
            }
            for value in schema.enum_.iter().flat_map(|e| e.deleted.iter()) {
                let mut args = param_args(key);
                args.push(display_value(value));
                self.emit(REQUEST_PARAMETER_ENUM_VALUE_REMOVED, at, Side::Revision, args);
            }
        }
    }

    fn request_body(&mut self, at: At<'_>, body: &RequestBodyDiff) {
        match body {
            RequestBodyDiff::Added { required: true } => {
                self.emit(REQUEST_BODY_ADDED_REQUIRED, at, Side::Revision, Vec::new());
            }
            RequestBodyDiff::Added { required: false } => {
                self.emit(REQUEST_BODY_ADDED_OPTIONAL, at, Side::Revision, Vec::new());
            }
            RequestBodyDiff::Deleted => {
                self.emit(REQUEST_BODY_REMOVED, at, Side::Base, Vec::new());
            }
            RequestBodyDiff::Modified(body) => {
                if let Some(required) = &body.required {
                    let rule = if required.to.as_bool() == Some(true) {
                        REQUEST_BODY_BECAME_REQUIRED
                    } else {
                        REQUEST_BODY_BECAME_OPTIONAL
                    };
                    self.emit(rule, at, Side::Revision, Vec::new());
                }
                self.request_content(at, &body.content);
            }
        }
    }

    fn request_content(&mut self, at: At<'_>, content: &ContentDiff) {
        for media in &content.added {
            self.emit(REQUEST_BODY_MEDIA_TYPE_ADDED, at, Side::Revision, vec![media.clone()]);
        }
        for media in &content.deleted {
            self.emit(REQUEST_BODY_MEDIA_TYPE_REMOVED, at, Side::Base, vec![media.clone()]);
        }
        for media in content.modified.values() {
            if let Some(schema) = &media.schema {
                self.request_schema(at, "", schema);
            }
        }
    }

    fn request_schema(&mut self, at: At<'_>, path: &str, schema: &SchemaDiff) {
        let label = property_label(path);
        if let Some(type_) = &schema.type_ {
            let [from, to] = diff_args(type_);
            self.emit(REQUEST_PROPERTY_TYPE_CHANGED, at, Side::Revision, vec![label.clone(), from, to]);
        }
        if let Some(values) = &schema.enum_ {
            for value in &values.deleted {
                self.emit(
                    REQUEST_PROPERTY_ENUM_VALUE_REMOVED,
                    at,
                    Side::Revision,
                    vec![label.clone(), display_value(value)],
                );
            }
            for value in &values.added {
                self.emit(
                    REQUEST_PROPERTY_ENUM_VALUE_ADDED,
                    at,
                    Side::Revision,
                    vec![label.clone(), display_value(value)],
                );
            }
        }

        let properties = &schema.properties;
        for (name, info) in &properties.added {
            let rule = if info.required {
                NEW_REQUIRED_REQUEST_PROPERTY
            } else {
                NEW_OPTIONAL_REQUEST_PROPERTY
            };
            self.emit(rule, at, Side::Revision, vec![child_path(path, name)]);
        }
        for name in properties.deleted.keys() {
            self.emit(REQUEST_PROPERTY_REMOVED, at, Side::Base, vec![child_path(path, name)]);
        }
        if let Some(required) = &schema.required {
            for name in required.added.iter().filter(|n| !properties.added.contains_key(*n)) {
                self.emit(
                    REQUEST_PROPERTY_BECAME_REQUIRED,
                    at,
                    Side::Revision,
                    vec![child_path(path, name)],
                );
            }
            for name in required.deleted.iter().filter(|n| !properties.deleted.contains_key(*n)) {
                self.emit(
                    REQUEST_PROPERTY_BECAME_OPTIONAL,
                    at,
                    Side::Revision,
                    vec![child_path(path, name)],
                );
            }
        }

        for (name, child) in &properties.modified {
            self.request_schema(at, &child_path(path, name), child);
        }
        if let Some(items) = &schema.items {
            self.request_schema(at, &format!("{}[]", path), items);
        }
    }

    fn responses(&mut self, at: At<'_>, responses: &ResponsesDiff) {
        for status in responses.added.iter().filter(|s| is_success(s)) {
            self.emit(RESPONSE_SUCCESS_STATUS_ADDED, at, Side::Revision, vec![status.clone()]);
        }
        for status in &responses.deleted {
            let rule = if is_success(status) {
                RESPONSE_SUCCESS_STATUS_REMOVED
            } else {
                RESPONSE_NON_SUCCESS_STATUS_REMOVED
            };
            self.emit(rule, at, Side::Base, vec![status.clone()]);
        }
        for (status, response) in &responses.modified {
            let content = &response.content;
            for media in &content.added {
                self.emit(
                    RESPONSE_MEDIA_TYPE_ADDED,
                    at,
                    Side::Revision,
                    vec![media.clone(), status.clone()],
                );
            }
            for media in &content.deleted {
                self.emit(
                    RESPONSE_MEDIA_TYPE_REMOVED,
                    at,
                    Side::Base,
                    vec![media.clone(), status.clone()],
                );
            }
            for media in content.modified.values() {
                if let Some(schema) = &media.schema {
                    self.response_schema(at, status, "", schema);
                }
            }
        }
    }

    fn response_schema(&mut self, at: At<'_>, status: &str, path: &str, schema: &SchemaDiff) {
        let label = property_label(path);
        if let Some(type_) = &schema.type_ {
            let [from, to] = diff_args(type_);
            self.emit(
                RESPONSE_PROPERTY_TYPE_CHANGED,
                at,
                Side::Revision,
                vec![label.clone(), from, to, status.to_string()],
            );
        }
        for value in schema.enum_.iter().flat_map(|e| e.added.iter()) {
            self.emit(
                RESPONSE_PROPERTY_ENUM_VALUE_ADDED,
                at,
                Side::Revision,
                vec![label.clone(), display_value(value), status.to_string()],
            );
        }

        let properties = &schema.properties;
        for name in properties.added.keys() {
            self.emit(
                RESPONSE_PROPERTY_ADDED,
                at,
                Side::Revision,
                vec![child_path(path, name), status.to_string()],
            );
        }
        for (name, info) in &properties.deleted {
            let rule = if info.required {
                RESPONSE_REQUIRED_PROPERTY_REMOVED
            } else {
                RESPONSE_OPTIONAL_PROPERTY_REMOVED
            };
            self.emit(rule, at, Side::Base, vec![child_path(path, name), status.to_string()]);
        }
        if let Some(required) = &schema.required {
            for name in required.deleted.iter().filter(|n| !properties.deleted.contains_key(*n)) {
                self.emit(
                    RESPONSE_PROPERTY_BECAME_OPTIONAL,
                    at,
                    Side::Revision,
                    vec![child_path(path, name), status.to_string()],
                );
            }
            for name in required.added.iter().filter(|n| !properties.added.contains_key(*n)) {
                self.emit(
                    RESPONSE_PROPERTY_BECAME_REQUIRED,
                    at,
                    Side::Revision,
                    vec![child_path(path, name), status.to_string()],
                );
            }
        }

        for (name, child) in &properties.modified {
            self.response_schema(at, status, &child_path(path, name), child);
        }
        if let Some(items) = &schema.items {
            self.response_schema(at, status, &format!("{}[]", path), items);
        }
    }
}

fn param_args(key: &str) -> Vec<String> {
    let (location, name) = split_param_key(key);
    vec![location.to_string(), name.to_string()]
}

fn removal_args(rule: Rule, lifecycle: &Lifecycle) -> Vec<String> {
    if rule.level == Level::Error && !lifecycle.deprecated {
        return Vec::new();
    }
    vec![lifecycle.sunset.clone().unwrap_or_else(|| "none".to_string())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComparisonConfig;
    use crate::diff::compute;
    use serde_json::{json, Value};

    fn spec(paths: Value) -> Value {
        json!({
            "openapi": "3.0.3",
            "info": { "title": "Pets", "version": "1.0.0" },
            "paths": paths
        })
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn changes(base: Value, revision: Value, days: u32) -> Vec<Change> {
        let tree = compute(&ComparisonConfig::default(), &base, &revision);
        check(&tree, &CheckContext::new(days, today())).into_iter().collect()
    }

    fn ids(changes: &[Change]) -> Vec<&'static str> {
        changes.iter().map(|c| c.id).collect()
    }

    #[test]
    fn rule_ids_are_unique() {
        let mut ids: Vec<_> = RULES.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), RULES.len());
    }

    #[test]
    fn removed_path_without_deprecation_is_error() {
        let base = spec(json!({ "/pets": { "get": { "responses": {} } } }));
        let found = changes(base, spec(json!({})), 0);

        assert_eq!(ids(&found), vec!["api-path-removed-without-deprecation"]);
        let change = &found[0];
        assert_eq!(change.level, Level::Error);
        assert_eq!(change.location.path, "/pets");
        assert_eq!(change.location.method, "GET");
        assert_eq!(change.location.side, Side::Base);
    }

    #[test]
    fn removal_after_sunset_is_info() {
        let base = spec(json!({
            "/pets": { "get": { "deprecated": true, "x-sunset": "2024-01-01", "responses": {} } }
        }));
        let found = changes(base, spec(json!({})), 0);
        assert_eq!(ids(&found), vec!["api-path-sunset-reached"]);
        assert_eq!(found[0].args, vec!["2024-01-01".to_string()]);
    }

    #[test]
    fn removal_before_sunset_is_error() {
        let base = spec(json!({
            "/pets": {
                "get": { "deprecated": true, "x-sunset": "2030-01-01", "responses": {} },
                "post": { "responses": {} }
            }
        }));
        let revision = spec(json!({ "/pets": { "post": { "responses": {} } } }));
        let found = changes(base, revision, 0);
        assert_eq!(ids(&found), vec!["api-removed-before-sunset"]);
    }

    #[test]
    fn deprecated_without_sunset_depends_on_days() {
        let base = spec(json!({
            "/pets": { "get": { "deprecated": true, "responses": {} } }
        }));
        let found = changes(base.clone(), spec(json!({})), 0);
        assert_eq!(ids(&found), vec!["api-path-sunset-reached"]);

        let found = changes(base, spec(json!({})), 30);
        assert_eq!(ids(&found), vec!["api-path-removed-before-sunset"]);
    }

    #[test]
    fn new_deprecation_checks_sunset() {
        let base = spec(json!({ "/pets": { "get": { "responses": {} } } }));
        let deprecated = |sunset: Value| {
            spec(json!({
                "/pets": { "get": { "deprecated": true, "x-sunset": sunset, "responses": {} } }
            }))
        };

        let found = changes(base.clone(), deprecated(Value::Null), 10);
        assert_eq!(ids(&found), vec!["api-deprecated", "api-deprecated-sunset-missing"]);

        let found = changes(base.clone(), deprecated(json!("2024-06-05")), 10);
        assert_eq!(ids(&found), vec!["api-deprecated", "api-sunset-date-too-small"]);
        assert_eq!(found[1].args, vec!["2024-06-05".to_string(), "2024-06-11".to_string()]);

        let found = changes(base.clone(), deprecated(json!("2024-07-01")), 10);
        assert_eq!(ids(&found), vec!["api-deprecated"]);

        let found = changes(base, deprecated(Value::Null), 0);
        assert_eq!(ids(&found), vec!["api-deprecated"]);
    }

    #[test]
    fn reactivation() {
        let base = spec(json!({ "/pets": { "get": { "deprecated": true, "responses": {} } } }));
        let revision = spec(json!({ "/pets": { "get": { "responses": {} } } }));
        assert_eq!(ids(&changes(base, revision, 0)), vec!["api-reactivated"]);
    }

    #[test]
    fn parameter_rules() {
        let op = |params: Value| spec(json!({ "/pets": { "get": { "parameters": params, "responses": {} } } }));
        let base = op(json!([
            { "name": "limit", "in": "query", "schema": { "type": "integer" } },
            { "name": "sort", "in": "query", "schema": { "type": "string", "enum": ["asc", "desc"] } },
            { "name": "trace", "in": "header", "schema": { "type": "string" } }
        ]));
        let revision = op(json!([
            { "name": "limit", "in": "query", "required": true, "schema": { "type": "string" } },
            { "name": "sort", "in": "query", "schema": { "type": "string", "enum": ["asc"] } },
            { "name": "tag", "in": "query", "schema": { "type": "string" } }
        ]));

        let found = changes(base, revision, 0);
        assert_eq!(
            ids(&found),
            vec![
                "new-optional-request-parameter",
                "request-parameter-removed",
                "request-parameter-became-required",
                "request-parameter-type-changed",
                "request-parameter-enum-value-removed",
            ]
        );
        assert_eq!(found[0].args, vec!["query".to_string(), "tag".to_string()]);
        assert_eq!(found[3].args, vec!["query", "limit", "integer", "string"]);
        assert_eq!(found[4].args, vec!["query", "sort", "desc"]);
    }

    #[test]
    fn request_body_rules() {
        let with_body = |body: Value| {
            spec(json!({ "/pets": { "post": { "requestBody": body, "responses": {} } } }))
        };
        let schema = |props: Value, required: Value| {
            json!({
                "content": {
                    "application/json": {
                        "schema": { "type": "object", "properties": props, "required": required }
                    }
                }
            })
        };
        let base = with_body(schema(
            json!({ "name": { "type": "string" }, "age": { "type": "integer" } }),
            json!(["name"]),
        ));
        let revision = with_body(schema(
            json!({
                "name": { "type": "string" },
                "tag": { "type": "string" },
                "owner": { "type": "string" }
            }),
            json!(["name", "owner"]),
        ));

        let found = changes(base, revision, 0);
        assert_eq!(
            ids(&found),
            vec![
                "new-required-request-property",
                "new-optional-request-property",
                "request-property-removed",
            ]
        );
        assert_eq!(found[0].args, vec!["owner".to_string()]);
    }

    #[test]
    fn request_body_added_and_removed() {
        let base = spec(json!({ "/pets": { "post": { "responses": {} } } }));
        let revision = spec(json!({
            "/pets": { "post": { "requestBody": { "required": true, "content": {} }, "responses": {} } }
        }));
        assert_eq!(
            ids(&changes(base.clone(), revision.clone(), 0)),
            vec!["request-body-added-required"]
        );
        assert_eq!(ids(&changes(revision, base, 0)), vec!["request-body-removed"]);
    }

    #[test]
    fn response_rules() {
        let with_response = |responses: Value| {
            spec(json!({ "/pets": { "get": { "responses": responses } } }))
        };
        let base = with_response(json!({
            "200": {
                "description": "ok",
                "content": {
                    "application/json": {
                        "schema": {
                            "type": "object",
                            "properties": { "id": { "type": "integer" }, "name": { "type": "string" } },
                            "required": ["id", "name"]
                        }
                    }
                }
            },
            "404": { "description": "missing" }
        }));
        let revision = with_response(json!({
            "200": {
                "description": "ok",
                "content": {
                    "application/json": {
                        "schema": {
                            "type": "object",
                            "properties": { "id": { "type": "string" }, "tag": { "type": "string" } },
                            "required": ["id"]
                        }
                    }
                }
            },
            "201": { "description": "created" }
        }));

        let found = changes(base, revision, 0);
        assert_eq!(
            ids(&found),
            vec![
                "response-success-status-added",
                "response-non-success-status-removed",
                "response-property-added",
                "response-required-property-removed",
                "response-property-type-changed",
            ]
        );
        assert_eq!(found[4].args, vec!["id", "integer", "string", "200"]);
    }

    #[test]
    fn operation_id_update() {
        let base = spec(json!({ "/pets": { "get": { "operationId": "list", "responses": {} } } }));
        let revision = spec(json!({ "/pets": { "get": { "operationId": "listPets", "responses": {} } } }));
        let found = changes(base, revision, 0);
        assert_eq!(ids(&found), vec!["api-operation-id-updated"]);
        assert_eq!(found[0].args, vec!["list", "listPets"]);
    }

    #[test]
    fn added_path_emits_per_operation() {
        let base = spec(json!({}));
        let revision = spec(json!({ "/pets": { "get": { "responses": {} }, "post": { "responses": {} } } }));
        let found = changes(base, revision, 0);
        assert_eq!(ids(&found), vec!["api-path-added", "api-path-added"]);
        assert_eq!(found[0].location.method, "GET");
        assert_eq!(found[1].location.method, "POST");
    }

    #[test]
    fn at_least_keeps_order() {
        let base = spec(json!({
            "/pets": { "get": { "parameters": [{ "name": "a", "in": "query" }], "responses": {} } }
        }));
        let revision = spec(json!({
            "/pets": { "get": { "parameters": [{ "name": "b", "in": "query" }], "responses": {} } },
            "/toys": { "get": { "responses": {} } }
        }));
        let tree = compute(&ComparisonConfig::default(), &base, &revision);
        let all = check(&tree, &CheckContext::new(0, today()));
        assert_eq!(all.len(), 3);
        assert_eq!(all.max_level(), Some(Level::Warn));

        let breaking = all.at_least(Level::Warn);
        assert_eq!(ids(&breaking.into_iter().collect::<Vec<_>>()), vec!["request-parameter-removed"]);
    }
}
