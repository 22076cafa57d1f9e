//! Warden core library: domain types, manifests, configuration, remote ports, errors.
//!
//! - [`types`]: newtypes and the deployment manifest structs
//! - [`manifest`]: managed workflow manifest resolver
//! - [`registry`]: deployment manifest loading
//! - [`config`]: deployer configuration with declared defaults
//! - [`ports`]: traits for the GitHub collaborators
//! - [`error`]: [`ConfigError`], [`ApiError`]

pub mod atomic;
pub mod config;
pub mod error;
pub mod manifest;
pub mod ports;
pub mod registry;
pub mod types;

pub use config::{ConfigDiagnostic, DeployerConfig, TagContextEntry};
pub use error::{ApiError, ConfigError};
pub use manifest::ManagedWorkflowManifest;
pub use ports::{
    BranchProtectionApi, BranchProtectionRule, CreateRuleInput, RepositoryRegistry, RuleMutation,
    SecretAccessApi, UpdateRuleInput,
};
pub use types::{
    DeploymentManifest, Module, Refspec, RepoName, RepositoryRequest, WorkflowCategory,
    WorkflowName,
};
