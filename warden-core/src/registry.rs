//! Deployment manifest (`workflow-deployment.yaml`).
//!
//! # Layout
//!
//! ```yaml
//! default_managed_refspec: tags/v1.4.0
//! modules:
//!   - name: payments
//!     repositories:
//!       - name: payments-api
//!         refspec: tags/v2.0.0
//!         optional_workflows: [managed-ci-deploy.yaml]
//!         language: [python]
//!         needs: [docker]
//! ```
//!
//! Repositories are handed out in declaration order across modules; nothing
//! here sorts them.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{io_err, ConfigError};
use crate::types::{DeploymentManifest, Refspec, RepoName};

/// Default file name of the deployment manifest.
pub const DEPLOYMENT_FILE: &str = "workflow-deployment.yaml";

/// Load a deployment manifest.
///
/// Returns `ConfigError::NotFound` if absent and `ConfigError::Parse` (with
/// path and line context) if malformed. An empty file is an empty manifest.
pub fn load_deployment_at(path: &Path) -> Result<DeploymentManifest, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(DeploymentManifest::default());
    }
    let manifest: Option<DeploymentManifest> =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let manifest = manifest.unwrap_or_default();
    tracing::debug!(
        path = %path.display(),
        modules = manifest.modules.len(),
        repositories = manifest.repositories().count(),
        "loaded deployment manifest"
    );
    Ok(manifest)
}

/// Refspec used for repositories that do not name one. The manifest's own
/// default wins over the configured one.
pub fn fallback_refspec<'a>(
    manifest: &'a DeploymentManifest,
    configured: Option<&'a Refspec>,
) -> Option<&'a Refspec> {
    manifest.default_managed_refspec.as_ref().or(configured)
}

/// Manifest repositories that are not part of the organization, in
/// declaration order.
pub fn missing_repositories<'a>(
    manifest: &'a DeploymentManifest,
    known: &BTreeSet<RepoName>,
) -> Vec<&'a RepoName> {
    manifest
        .repositories()
        .map(|r| &r.name)
        .filter(|name| !known.contains(*name))
        .collect()
}
