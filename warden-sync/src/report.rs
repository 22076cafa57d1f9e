//! Deployment report accumulator.
//!
//! Persists the history of which workflows were deployed where:
//!
//! ```yaml
//! repositories:
//!   payments-api:
//!     refspec: tags/v1.4.0
//!     workflows:
//!       - name: managed-ci-build.yaml
//!         updated: 2024-05-02 10:31:07
//!       - name: managed-ci-pr-title.yaml
//! ```
//!
//! Entries are never removed. A run refreshes `updated` on workflows it
//! deployed, appends workflows the report has not seen, and records the
//! refspec that was used. Writes use the same atomic `.tmp` + rename pattern
//! as every other document.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::types::nullable;
use warden_core::{atomic, Refspec, RepoName, WorkflowName};

use crate::error::{io_err, SyncError};

/// `strftime` format of the `updated` field.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render `now` in the report's timestamp format.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEntry {
    pub name: WorkflowName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    #[serde(default)]
    pub refspec: Option<Refspec>,
    #[serde(default, deserialize_with = "nullable")]
    pub workflows: Vec<WorkflowEntry>,
}

impl RepositoryEntry {
    fn find_mut(&mut self, name: &WorkflowName) -> Option<&mut WorkflowEntry> {
        self.workflows.iter_mut().find(|w| &w.name == name)
    }
}

/// The whole report document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    #[serde(default, deserialize_with = "nullable")]
    pub repositories: BTreeMap<RepoName, RepositoryEntry>,
}

impl DeploymentReport {
    /// Merge one repository's outcome.
    ///
    /// `deployed` names get `updated = timestamp` (refreshed or appended);
    /// `unchanged` names are appended without a timestamp when new and left
    /// alone otherwise.
    pub fn record(
        &mut self,
        repo: &RepoName,
        refspec: Option<&Refspec>,
        deployed: &[WorkflowName],
        unchanged: &[WorkflowName],
        timestamp: &str,
    ) {
        let entry = self.repositories.entry(repo.clone()).or_default();
        entry.refspec = refspec.cloned();

        for name in unchanged {
            if entry.find_mut(name).is_none() {
                entry.workflows.push(WorkflowEntry {
                    name: name.clone(),
                    updated: None,
                });
            }
        }

        for name in deployed {
            match entry.find_mut(name) {
                Some(existing) => existing.updated = Some(timestamp.to_string()),
                None => entry.workflows.push(WorkflowEntry {
                    name: name.clone(),
                    updated: Some(timestamp.to_string()),
                }),
            }
        }
    }

    pub fn get(&self, repo: &RepoName) -> Option<&RepositoryEntry> {
        self.repositories.get(repo)
    }
}

/// Parse a report document. Empty or null documents are an empty report.
pub fn parse(document: &str) -> Result<DeploymentReport, serde_yaml::Error> {
    if document.trim().is_empty() {
        return Ok(DeploymentReport::default());
    }
    let report: Option<DeploymentReport> = serde_yaml::from_str(document)?;
    Ok(report.unwrap_or_default())
}

/// Load the report at `path`, or an empty one if the file does not exist.
pub fn load_at(path: &Path) -> Result<DeploymentReport, SyncError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no existing report; starting empty");
            return Ok(DeploymentReport::default());
        }
        Err(err) => return Err(io_err(path, err)),
    };
    Ok(parse(&contents)?)
}

/// Save the report atomically, creating parent directories.
pub fn save_at(path: &Path, report: &DeploymentReport) -> Result<(), SyncError> {
    let yaml = serde_yaml::to_string(report)?;
    atomic::write_atomic(path, yaml.as_bytes())?;
    tracing::info!(path = %path.display(), repositories = report.repositories.len(), "report saved");
    Ok(())
}
