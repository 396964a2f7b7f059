//! Comparison configuration built from request parameters.
//!
//! Every recognized parameter is validated on its own. Invalid values are
//! logged and replaced by the default; building a config never fails.

use regex::Regex;
use tracing::info;

pub const PATH_FILTER: &str = "path-filter";
pub const FILTER_EXTENSION: &str = "filter-extension";
pub const PATH_PREFIX_BASE: &str = "path-prefix-base";
pub const PATH_PREFIX_REVISION: &str = "path-prefix-revision";
pub const PATH_STRIP_PREFIX_BASE: &str = "path-strip-prefix-base";
pub const PATH_STRIP_PREFIX_REVISION: &str = "path-strip-prefix-revision";
pub const DEPRECATION_DAYS: &str = "deprecation-days";
pub const EXCLUDE_EXAMPLES: &str = "exclude-examples";
pub const EXCLUDE_DESCRIPTION: &str = "exclude-description";
pub const EXCLUDE_ENDPOINTS: &str = "exclude-endpoints";

/// Ordered query parameters of a request.
///
/// Repeated keys are kept; lookups return the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// First value supplied for `key`, if any.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Options controlling how two documents are compared.
#[derive(Debug, Clone, Default)]
pub struct ComparisonConfig {
    /// Only paths matching this pattern are compared.
    pub path_filter: Option<Regex>,
    /// Path items and operations with an extension key matching this
    /// pattern are left out.
    pub filter_extension: Option<Regex>,
    pub path_prefix_base: String,
    pub path_prefix_revision: String,
    pub path_strip_prefix_base: String,
    pub path_strip_prefix_revision: String,
    /// Minimal number of days between deprecating an operation and its sunset.
    pub deprecation_days: u32,
    pub exclude_examples: bool,
    pub exclude_description: bool,
    /// Leave the endpoint summary out of the diff tree.
    pub exclude_endpoints: bool,
}

impl ComparisonConfig {
    /// Build a config from the recognized request parameters.
    pub fn from_params(params: &QueryParams) -> Self {
        Self {
            path_filter: regex_param(params, PATH_FILTER),
            filter_extension: regex_param(params, FILTER_EXTENSION),
            path_prefix_base: string_param(params, PATH_PREFIX_BASE),
            path_prefix_revision: string_param(params, PATH_PREFIX_REVISION),
            path_strip_prefix_base: string_param(params, PATH_STRIP_PREFIX_BASE),
            path_strip_prefix_revision: string_param(params, PATH_STRIP_PREFIX_REVISION),
            deprecation_days: days_param(params, DEPRECATION_DAYS, 0),
            exclude_examples: bool_param(params, EXCLUDE_EXAMPLES, false),
            exclude_description: bool_param(params, EXCLUDE_DESCRIPTION, false),
            exclude_endpoints: bool_param(params, EXCLUDE_ENDPOINTS, false),
        }
    }

    /// Same config with the endpoint summary switched off.
    pub fn without_endpoints(mut self) -> Self {
        self.exclude_endpoints = true;
        self
    }

    /// Path as compared for the base document.
    pub fn base_path(&self, path: &str) -> String {
        rewrite_path(path, &self.path_strip_prefix_base, &self.path_prefix_base)
    }

    /// Path as compared for the revision document.
    pub fn revision_path(&self, path: &str) -> String {
        rewrite_path(
            path,
            &self.path_strip_prefix_revision,
            &self.path_prefix_revision,
        )
    }

    /// True when the path passes the path filter.
    pub fn matches_path(&self, path: &str) -> bool {
        self.path_filter
            .as_ref()
            .map(|re| re.is_match(path))
            .unwrap_or(true)
    }

    /// True when any of the extension keys is excluded by the extension filter.
    pub fn excludes_extensions<'a>(&self, mut keys: impl Iterator<Item = &'a str>) -> bool {
        match &self.filter_extension {
            Some(re) => keys.any(|key| re.is_match(key)),
            None => false,
        }
    }
}

fn rewrite_path(path: &str, strip: &str, prefix: &str) -> String {
    let stripped = if strip.is_empty() {
        path
    } else {
        path.strip_prefix(strip).unwrap_or(path)
    };
    format!("{}{}", prefix, stripped)
}

fn string_param(params: &QueryParams, key: &str) -> String {
    params.first(key).unwrap_or_default().to_string()
}

fn regex_param(params: &QueryParams, key: &str) -> Option<Regex> {
    let value = params.first(key)?;
    if value.is_empty() {
        return None;
    }
    match Regex::new(value) {
        Ok(re) => Some(re),
        Err(e) => {
            info!("invalid query string '{}: {}' (using default 'none'): {}", key, value, e);
            None
        }
    }
}

fn days_param(params: &QueryParams, key: &str, default: u32) -> u32 {
    let Some(value) = params.first(key) else {
        return default;
    };
    match value.parse::<u32>() {
        Ok(days) => days,
        Err(_) => {
            info!("invalid query string '{}: {}' (using default '{}')", key, value, default);
            default
        }
    }
}

fn bool_param(params: &QueryParams, key: &str, default: bool) -> bool {
    match params.first(key) {
        None => default,
        Some("true") => true,
        Some("false") => false,
        Some(value) => {
            info!("invalid query string '{}: {}' (using default '{}')", key, value, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().copied().collect()
    }

    #[test]
    fn defaults_when_absent() {
        let config = ComparisonConfig::from_params(&QueryParams::default());
        assert!(config.path_filter.is_none());
        assert!(config.filter_extension.is_none());
        assert_eq!(config.path_prefix_base, "");
        assert_eq!(config.path_prefix_revision, "");
        assert_eq!(config.path_strip_prefix_base, "");
        assert_eq!(config.path_strip_prefix_revision, "");
        assert_eq!(config.deprecation_days, 0);
        assert!(!config.exclude_examples);
        assert!(!config.exclude_description);
        assert!(!config.exclude_endpoints);
    }

    #[test]
    fn path_filter() {
        let config = ComparisonConfig::from_params(&params(&[(PATH_FILTER, "test")]));
        assert_eq!(config.path_filter.as_ref().map(Regex::as_str), Some("test"));
        assert!(config.matches_path("/test/1"));
        assert!(!config.matches_path("/pets"));
    }

    #[test]
    fn invalid_path_filter_keeps_default() {
        let config = ComparisonConfig::from_params(&params(&[(PATH_FILTER, "([")]));
        assert!(config.path_filter.is_none());
        assert!(config.matches_path("/anything"));
    }

    #[test]
    fn deprecation_days() {
        let config = ComparisonConfig::from_params(&params(&[(DEPRECATION_DAYS, "3")]));
        assert_eq!(config.deprecation_days, 3);
    }

    #[test]
    fn invalid_deprecation_days_keep_default() {
        for value in ["-3", "abc", "1.5", ""] {
            let config = ComparisonConfig::from_params(&params(&[(DEPRECATION_DAYS, value)]));
            assert_eq!(config.deprecation_days, 0, "value {:?}", value);
        }
    }

    #[test]
    fn exclude_examples() {
        let config = ComparisonConfig::from_params(&params(&[(EXCLUDE_EXAMPLES, "true")]));
        assert!(config.exclude_examples);

        let config = ComparisonConfig::from_params(&params(&[(EXCLUDE_EXAMPLES, "false")]));
        assert!(!config.exclude_examples);
    }

    #[test]
    fn invalid_bool_tokens_keep_default() {
        for value in ["TRUE", "yes", "1", ""] {
            let config = ComparisonConfig::from_params(&params(&[
                (EXCLUDE_DESCRIPTION, value),
                (EXCLUDE_ENDPOINTS, value),
            ]));
            assert!(!config.exclude_description, "value {:?}", value);
            assert!(!config.exclude_endpoints, "value {:?}", value);
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let config = ComparisonConfig::from_params(&params(&[
            (DEPRECATION_DAYS, "7"),
            (DEPRECATION_DAYS, "30"),
        ]));
        assert_eq!(config.deprecation_days, 7);
    }

    #[test]
    fn path_rewriting_strips_then_prefixes() {
        let config = ComparisonConfig::from_params(&params(&[
            (PATH_STRIP_PREFIX_BASE, "/api/v1"),
            (PATH_PREFIX_BASE, "/v2"),
            (PATH_PREFIX_REVISION, "/x"),
        ]));
        assert_eq!(config.base_path("/api/v1/pets"), "/v2/pets");
        assert_eq!(config.base_path("/other"), "/v2/other");
        assert_eq!(config.revision_path("/pets"), "/x/pets");
    }

    #[test]
    fn extension_filter() {
        let config = ComparisonConfig::from_params(&params(&[(FILTER_EXTENSION, "x-beta")]));
        assert!(config.excludes_extensions(["x-beta", "x-other"].into_iter()));
        assert!(!config.excludes_extensions(["x-stable"].into_iter()));

        let config = ComparisonConfig::default();
        assert!(!config.excludes_extensions(["x-beta"].into_iter()));
    }

    #[test]
    fn without_endpoints() {
        let config = ComparisonConfig::default().without_endpoints();
        assert!(config.exclude_endpoints);
    }
}
