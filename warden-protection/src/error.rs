//! Error types for warden-protection.
//!
//! Each variant names the repository and the step that failed so the log line
//! is enough to act on.

use thiserror::Error;

use warden_core::{ApiError, RepoName};

#[derive(Debug, Error)]
pub enum ProtectionError {
    #[error("{repo}: could not resolve repository id: {source}")]
    RepositoryId {
        repo: RepoName,
        #[source]
        source: ApiError,
    },

    #[error("{repo}: could not resolve default branch: {source}")]
    DefaultBranch {
        repo: RepoName,
        #[source]
        source: ApiError,
    },

    #[error("{repo}: could not list branch protection rules: {source}")]
    InspectRules {
        repo: RepoName,
        #[source]
        source: ApiError,
    },

    #[error("{repo}: branch protection mutation failed: {source}")]
    Mutation {
        repo: RepoName,
        #[source]
        source: ApiError,
    },

    #[error("{repo}: could not resolve numeric repository id: {source}")]
    NumericId {
        repo: RepoName,
        #[source]
        source: ApiError,
    },

    #[error("secret {secret}: {source}")]
    SecretAccess {
        secret: String,
        #[source]
        source: ApiError,
    },
}
