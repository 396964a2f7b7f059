//! The comparison engine behind a trait, so handlers can be tested
//! against a stub.

use serde_json::Value;
use tracing::{debug, info};

use crate::checker::{self, ChangeSet, CheckContext};
use crate::config::ComparisonConfig;
use crate::diff::{self, DiffTree};
use crate::error::LoadError;
use crate::loader;
use crate::source::SpecSource;

/// Parses two documents into a diff tree and classifies the tree.
pub trait Comparator: Send + Sync {
    /// Load both sources and compute their structural difference.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] when either document cannot be loaded.
    fn compare(
        &self,
        config: &ComparisonConfig,
        base: &SpecSource,
        revision: &SpecSource,
    ) -> Result<DiffTree, LoadError>;

    /// Evaluate the compatibility rules. Total for any tree.
    fn classify(&self, tree: &DiffTree, ctx: &CheckContext) -> ChangeSet;
}

/// OpenAPI 3.x comparator built on [`loader`], [`diff`] and [`checker`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApiComparator;

impl Comparator for OpenApiComparator {
    fn compare(
        &self,
        config: &ComparisonConfig,
        base: &SpecSource,
        revision: &SpecSource,
    ) -> Result<DiffTree, LoadError> {
        let base_doc = load("base", base)?;
        let revision_doc = load("revision", revision)?;
        let tree = diff::compute(config, &base_doc, &revision_doc);
        debug!(empty = tree.is_empty(), "computed diff");
        Ok(tree)
    }

    fn classify(&self, tree: &DiffTree, ctx: &CheckContext) -> ChangeSet {
        checker::check(tree, ctx)
    }
}

fn load(side: &str, source: &SpecSource) -> Result<Value, LoadError> {
    let origin = source.origin().to_string();
    loader::load_spec(
        source.content(),
        &origin,
        &source.ref_base(),
        source.external_refs(),
    )
    .map_err(|e| {
        info!("failed to load {} spec from '{}' with '{}'", side, origin, e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BASE: &str = "openapi: 3.0.3
info:
  title: Pets
  version: 1.0.0
paths:
  /pets:
    get:
      responses:
        '200':
          description: ok
";

    const REVISION: &str = "openapi: 3.0.3
info:
  title: Pets
  version: 1.0.0
paths: {}
";

    fn source(content: &str) -> (tempfile::NamedTempFile, SpecSource) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let source = SpecSource::from_path(file.path()).unwrap();
        (file, source)
    }

    #[test]
    fn compare_and_classify() {
        let (_b, base) = source(BASE);
        let (_r, revision) = source(REVISION);

        let comparator = OpenApiComparator;
        let tree = comparator
            .compare(&ComparisonConfig::default(), &base, &revision)
            .unwrap();
        assert!(tree.paths.deleted.contains_key("/pets"));

        let changes = comparator.classify(&tree, &CheckContext::now(0));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn invalid_document_is_load_error() {
        let (_b, base) = source("openapi: 2.0\ninfo: {}\n");
        let (_r, revision) = source(REVISION);

        let result = OpenApiComparator.compare(&ComparisonConfig::default(), &base, &revision);
        assert!(matches!(result, Err(LoadError::InvalidDocument { .. })));
    }

    #[test]
    fn empty_document_is_load_error() {
        let (_b, base) = source("");
        let (_r, revision) = source(REVISION);

        let result = OpenApiComparator.compare(&ComparisonConfig::default(), &base, &revision);
        assert!(result.is_err());
    }
}
