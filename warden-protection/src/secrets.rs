//! Organization secret access grants.
//!
//! `common-secrets` go to every repository of the deployment manifest;
//! `optional-secrets[need]` go to each repository listing `need`. A grant
//! unions the secret's selected repository ids with the new ones and only
//! writes when that adds something.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use warden_core::{ApiError, DeployerConfig, DeploymentManifest, RepoName, SecretAccessApi};

use crate::error::ProtectionError;

/// Result of granting one secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretGrant {
    pub secret: String,
    /// Repository ids that were not selected before.
    pub added: BTreeSet<u64>,
    /// The selection was written (false when nothing was added or on dry run).
    pub written: bool,
}

/// Add `repo_ids` to the repositories selected for `secret`.
pub fn grant_secret(
    api: &dyn SecretAccessApi,
    org: &str,
    secret: &str,
    repo_ids: &BTreeSet<u64>,
    dry_run: bool,
) -> Result<SecretGrant, ProtectionError> {
    let access_err = |source: ApiError| ProtectionError::SecretAccess {
        secret: secret.to_string(),
        source,
    };
    let current = api.secret_repository_ids(org, secret).map_err(access_err)?;
    let added: BTreeSet<u64> = repo_ids.difference(&current).copied().collect();

    let mut written = false;
    if added.is_empty() {
        tracing::debug!(secret, "secret already granted");
    } else if dry_run {
        tracing::info!(secret, added = added.len(), "[dry-run] would grant secret");
    } else {
        let merged: BTreeSet<u64> = current.union(&added).copied().collect();
        api.set_secret_repository_ids(org, secret, &merged)
            .map_err(access_err)?;
        tracing::info!(secret, added = added.len(), "secret granted");
        written = true;
    }

    Ok(SecretGrant {
        secret: secret.to_string(),
        added,
        written,
    })
}

/// Which repositories each secret should reach, per the configuration.
pub fn secret_targets<'a>(
    config: &DeployerConfig,
    manifest: &'a DeploymentManifest,
) -> BTreeMap<String, BTreeSet<&'a RepoName>> {
    let mut targets: BTreeMap<String, BTreeSet<&RepoName>> = BTreeMap::new();
    for request in manifest.repositories() {
        for secret in &config.common_secrets {
            targets.entry(secret.clone()).or_default().insert(&request.name);
        }
        for secret in config.secrets_for_needs(&request.needs) {
            targets.entry(secret).or_default().insert(&request.name);
        }
    }
    targets
}

#[derive(Debug, Clone, Default)]
pub struct SecretsSummary {
    pub grants: Vec<SecretGrant>,
    /// Repositories or secrets that could not be processed, with the error.
    pub failures: Vec<String>,
}

impl SecretsSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Grant every configured secret to its target repositories.
///
/// A repository whose id cannot be resolved is left out of every grant; a
/// secret that cannot be read or written is reported and the next one is
/// tried.
pub fn grant_all(
    api: &dyn SecretAccessApi,
    org: &str,
    config: &DeployerConfig,
    manifest: &DeploymentManifest,
    dry_run: bool,
) -> SecretsSummary {
    let mut summary = SecretsSummary::default();
    let targets = secret_targets(config, manifest);

    let mut ids: BTreeMap<&RepoName, u64> = BTreeMap::new();
    let mut unresolved: BTreeSet<&RepoName> = BTreeSet::new();
    for repo in targets.values().flatten() {
        if ids.contains_key(repo) || unresolved.contains(repo) {
            continue;
        }
        match api.repository_numeric_id(org, repo) {
            Ok(id) => {
                ids.insert(*repo, id);
            }
            Err(source) => {
                let err = ProtectionError::NumericId {
                    repo: (*repo).clone(),
                    source,
                };
                tracing::error!(error = %err, "repository left out of secret grants");
                summary.failures.push(err.to_string());
                unresolved.insert(*repo);
            }
        }
    }

    for (secret, repos) in &targets {
        let repo_ids: BTreeSet<u64> = repos.iter().filter_map(|r| ids.get(r).copied()).collect();
        if repo_ids.is_empty() {
            continue;
        }
        match grant_secret(api, org, secret, &repo_ids, dry_run) {
            Ok(grant) => summary.grants.push(grant),
            Err(err) => {
                tracing::error!(error = %err, "secret grant failed");
                summary.failures.push(err.to_string());
            }
        }
    }
    summary
}
