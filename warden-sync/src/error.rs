//! Error types for warden-sync.

use std::path::PathBuf;

use thiserror::Error;

use warden_core::{ApiError, ConfigError, RepoName, WorkflowCategory, WorkflowName};

/// A git command that could not be run or exited non-zero.
#[derive(Debug, Error)]
pub enum ScmError {
    /// The process could not be spawned at all.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit. Credentials are already redacted from every field.
    #[error("`{command}` exited with {code:?}\nstdout: {stdout}\nstderr: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// All errors that can arise while reconciling or deploying workflows.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Manifest, configuration or atomic-write failure from warden-core.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Version-control failure.
    #[error("git error: {0}")]
    Scm(#[from] ScmError),

    /// Remote API failure (repository listing, archive status).
    #[error("GitHub API error: {0}")]
    Api(#[from] ApiError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A workflow named by the manifest has no file in the bundle.
    #[error("{category} workflow '{name}' is listed in the manifest but missing from the bundle")]
    MissingSource {
        category: WorkflowCategory,
        name: WorkflowName,
    },

    /// The deployment manifest names a repository the organization lacks.
    #[error("repository '{repo}' does not exist in organization '{org}'")]
    RepositoryNotFound { org: String, repo: RepoName },

    /// Report YAML (de)serialization error.
    #[error("report YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
