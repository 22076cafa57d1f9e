//! Managed workflow manifest (`workflow-manifest.yaml` inside the bundle).
//!
//! ```yaml
//! template_workflows: [managed-ci-pr-title.yaml]
//! primary_workflows:  [managed-ci-build.yaml, managed-ci-scan.yaml]
//! optional_workflows: [managed-ci-deploy.yaml]
//! ```
//!
//! Resolution is a pure parse. A missing or null key yields an empty list and
//! file names are not validated; a bad entry simply fails its file lookup later.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{io_err, ConfigError};
use crate::types::WorkflowName;

/// File name of the manifest at the root of a workflow bundle.
pub const MANIFEST_FILE: &str = "workflow-manifest.yaml";

/// The three ordered workflow lists of one bundle version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManagedWorkflowManifest {
    pub template_workflows: Vec<WorkflowName>,
    pub primary_workflows: Vec<WorkflowName>,
    pub optional_workflows: Vec<WorkflowName>,
}

#[derive(Debug, Deserialize, Default)]
struct RawManifest {
    #[serde(default)]
    template_workflows: Option<Vec<WorkflowName>>,
    #[serde(default)]
    primary_workflows: Option<Vec<WorkflowName>>,
    #[serde(default)]
    optional_workflows: Option<Vec<WorkflowName>>,
}

impl ManagedWorkflowManifest {
    /// Union of all three categories. Files outside this set are candidates
    /// for retirement.
    pub fn all_names(&self) -> BTreeSet<&WorkflowName> {
        self.template_workflows
            .iter()
            .chain(&self.primary_workflows)
            .chain(&self.optional_workflows)
            .collect()
    }
}

/// Parse a manifest document. Empty documents resolve to an empty manifest.
pub fn resolve(document: &str) -> Result<ManagedWorkflowManifest, serde_yaml::Error> {
    if document.trim().is_empty() {
        return Ok(ManagedWorkflowManifest::default());
    }
    let raw: Option<RawManifest> = serde_yaml::from_str(document)?;
    let raw = raw.unwrap_or_default();
    Ok(ManagedWorkflowManifest {
        template_workflows: raw.template_workflows.unwrap_or_default(),
        primary_workflows: raw.primary_workflows.unwrap_or_default(),
        optional_workflows: raw.optional_workflows.unwrap_or_default(),
    })
}

/// Load `<bundle_root>/workflow-manifest.yaml`.
pub fn load_at(bundle_root: &Path) -> Result<ManagedWorkflowManifest, ConfigError> {
    let path = bundle_root.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    resolve(&contents).map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(list: &[WorkflowName]) -> Vec<&str> {
        list.iter().map(WorkflowName::as_str).collect()
    }

    #[test]
    fn resolves_all_three_lists_in_order() {
        let m = resolve(
            "template_workflows: [t.yml]\nprimary_workflows: [b.yml, a.yml]\noptional_workflows: [o.yml]\n",
        )
        .expect("resolve");
        assert_eq!(names(&m.template_workflows), ["t.yml"]);
        assert_eq!(names(&m.primary_workflows), ["b.yml", "a.yml"]);
        assert_eq!(names(&m.optional_workflows), ["o.yml"]);
    }

    #[test]
    fn missing_and_null_keys_default_to_empty() {
        let m = resolve("primary_workflows: [ci.yml]\noptional_workflows:\n").expect("resolve");
        assert_eq!(names(&m.primary_workflows), ["ci.yml"]);
        assert!(m.template_workflows.is_empty());
        assert!(m.optional_workflows.is_empty());
    }

    #[test]
    fn empty_document_is_empty_manifest() {
        assert_eq!(resolve("").expect("resolve"), ManagedWorkflowManifest::default());
        assert_eq!(resolve("  \n").expect("resolve"), ManagedWorkflowManifest::default());
        assert_eq!(resolve("~\n").expect("resolve"), ManagedWorkflowManifest::default());
    }

    #[test]
    fn malformed_names_propagate_unchanged() {
        let m = resolve("primary_workflows: ['../odd name.yml']\n").expect("resolve");
        assert_eq!(names(&m.primary_workflows), ["../odd name.yml"]);
    }

    #[test]
    fn all_names_unions_categories() {
        let m = resolve(
            "template_workflows: [a]\nprimary_workflows: [b, a]\noptional_workflows: [c]\n",
        )
        .expect("resolve");
        let all: Vec<_> = m.all_names().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(all, ["a", "b", "c"]);
    }

    #[test]
    fn load_at_reports_missing_manifest() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_at(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    }

    #[test]
    fn load_at_reports_parse_error_with_path() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join(MANIFEST_FILE), "primary_workflows: {nested: [").expect("write");
        let err = load_at(dir.path()).unwrap_err();
        assert!(err.to_string().contains(MANIFEST_FILE), "got: {err}");
    }
}
