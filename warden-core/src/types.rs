//! Domain types shared by every warden crate.
//!
//! Names that travel through the system (repositories, workflow files,
//! refspecs) are newtypes so they cannot be mixed up at call sites.
//! All structs are serde-compatible with the YAML documents they are read from.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a repository inside the managed organization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoName(pub String);

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Bare file name of a CI workflow (e.g. `managed-ci-build.yaml`).
///
/// Never a path: the directory is implied by the category it is resolved in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowName(pub String);

impl WorkflowName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this file carries the managed-file prefix marker.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for WorkflowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for WorkflowName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkflowName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Branch, tag or commit selecting a version of the managed workflow bundle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Refspec(pub String);

impl Refspec {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Refspec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Refspec {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Refspec {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Deserialize an explicit `null` (e.g. `needs:` with nothing after it) as
/// the type's default. Pair with `#[serde(default)]` for absent keys.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The three manifest categories, each with its own deployment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowCategory {
    /// Copied only when absent; content drift is ignored.
    Template,
    /// Mandatory; content-compared on every run.
    Primary,
    /// Deployed only when the repository requests it.
    Optional,
}

impl fmt::Display for WorkflowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowCategory::Template => write!(f, "template"),
            WorkflowCategory::Primary => write!(f, "primary"),
            WorkflowCategory::Optional => write!(f, "optional"),
        }
    }
}

// ---------------------------------------------------------------------------
// Deployment manifest
// ---------------------------------------------------------------------------

/// One repository entry of the deployment manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRequest {
    pub name: RepoName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refspec: Option<Refspec>,
    #[serde(default, deserialize_with = "nullable")]
    pub optional_workflows: BTreeSet<WorkflowName>,
    /// Languages declared for the repository; used when the repository
    /// variable holding the language is not set.
    #[serde(default, deserialize_with = "nullable")]
    pub language: Vec<String>,
    /// Secret groups the repository needs access to.
    #[serde(default, deserialize_with = "nullable")]
    pub needs: Vec<String>,
}

impl RepositoryRequest {
    pub fn new(name: impl Into<RepoName>) -> Self {
        Self {
            name: name.into(),
            refspec: None,
            optional_workflows: BTreeSet::new(),
            language: Vec::new(),
            needs: Vec::new(),
        }
    }

    /// Refspec for this repository, falling back to `default`.
    pub fn resolved_refspec<'a>(&'a self, default: Option<&'a Refspec>) -> Option<&'a Refspec> {
        self.refspec.as_ref().or(default)
    }

    /// First declared language, if any.
    pub fn declared_language(&self) -> Option<&str> {
        self.language.first().map(String::as_str)
    }
}

/// A named group of repositories in the deployment manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub repositories: Vec<RepositoryRequest>,
}

/// Root of `workflow-deployment.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeploymentManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_managed_refspec: Option<Refspec>,
    #[serde(default, deserialize_with = "nullable")]
    pub modules: Vec<Module>,
}

impl DeploymentManifest {
    /// All repository requests in declaration order across modules.
    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryRequest> {
        self.modules.iter().flat_map(|m| m.repositories.iter())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
