//! Remote collaborators the engines talk to.
//!
//! The traits are blocking and take `&self`; an implementation owns its HTTP
//! agent and credentials. `warden-github` provides the production adapter and
//! tests use in-memory fakes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::types::RepoName;

/// One branch-protection rule as seen on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchProtectionRule {
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub required_status_check_contexts: Vec<String>,
    #[serde(default)]
    pub requires_status_checks: bool,
    #[serde(default)]
    pub requires_strict_status_checks: bool,
}

/// Input of the create-rule mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleInput {
    pub repository_id: String,
    pub pattern: String,
    pub required_status_check_contexts: Vec<String>,
    pub requires_status_checks: bool,
    pub requires_strict_status_checks: bool,
}

/// Input of the update-rule mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleInput {
    pub branch_protection_rule_id: String,
    pub pattern: String,
    pub required_status_check_contexts: Vec<String>,
    pub requires_status_checks: bool,
    pub requires_strict_status_checks: bool,
}

/// What a 2xx mutation response carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMutation {
    /// The response contained `branchProtectionRule`.
    Applied { rule_id: Option<String> },
    /// The response was successful but the expected field was absent.
    MissingRule,
}

/// Organization-level repository facts.
pub trait RepositoryRegistry {
    fn list_repository_names(&self, org: &str) -> Result<BTreeSet<RepoName>, ApiError>;
    fn is_archived(&self, org: &str, repo: &RepoName) -> Result<bool, ApiError>;
}

/// GraphQL branch-protection surface plus the repository variable used for
/// language detection.
pub trait BranchProtectionApi {
    fn repository_id(&self, org: &str, repo: &RepoName) -> Result<String, ApiError>;
    fn default_branch_name(&self, org: &str, repo: &RepoName) -> Result<String, ApiError>;
    fn branch_protection_rules(
        &self,
        org: &str,
        repo: &RepoName,
    ) -> Result<Vec<BranchProtectionRule>, ApiError>;
    fn create_branch_protection_rule(&self, input: &CreateRuleInput)
        -> Result<RuleMutation, ApiError>;
    fn update_branch_protection_rule(&self, input: &UpdateRuleInput)
        -> Result<RuleMutation, ApiError>;

    /// Value of an Actions repository variable; `Ok(None)` when unset.
    fn repository_variable(
        &self,
        org: &str,
        repo: &RepoName,
        name: &str,
    ) -> Result<Option<String>, ApiError>;
}

/// Organization secrets restricted to selected repositories.
pub trait SecretAccessApi {
    fn repository_numeric_id(&self, org: &str, repo: &RepoName) -> Result<u64, ApiError>;
    fn secret_repository_ids(&self, org: &str, secret: &str) -> Result<BTreeSet<u64>, ApiError>;
    fn set_secret_repository_ids(
        &self,
        org: &str,
        secret: &str,
        ids: &BTreeSet<u64>,
    ) -> Result<(), ApiError>;
}
