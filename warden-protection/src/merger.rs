//! Branch-protection state machine.
//!
//! Per repository, always re-derived from the remote:
//!
//! ```text
//! Query ──▶ ResolveDefaultBranch ──▶ InspectProtection ─┬─ NotFound ──▶ Create
//!                                                       └─ Found ─────▶ Update | Unchanged
//! ```
//!
//! A failure in the first three steps or a failed mutation aborts only the
//! current repository. A 2xx mutation response without `branchProtectionRule`
//! is logged and reported as unconfirmed; the run carries on.

use serde::Serialize;

use warden_core::{
    BranchProtectionApi, BranchProtectionRule, CreateRuleInput, DeploymentManifest, Refspec,
    RepoName, RepositoryRequest, RuleMutation, UpdateRuleInput,
};

use crate::contexts::{ContextPolicy, RequiredStatusCheckSet};
use crate::error::ProtectionError;

/// What happened to the default-branch rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionAction {
    Created,
    Updated,
    /// The rule already required exactly the merged set, strictly.
    Unchanged,
    WouldCreate,
    WouldUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectionOutcome {
    pub repo: RepoName,
    pub branch: String,
    pub action: ProtectionAction,
    pub contexts: RequiredStatusCheckSet,
    pub language: Option<String>,
    /// False when the mutation response lacked the rule payload.
    pub confirmed: bool,
}

/// Result of InspectProtection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleState {
    NotFound,
    Found(BranchProtectionRule),
}

impl RuleState {
    /// The rule whose pattern is exactly `branch`.
    pub fn inspect(rules: Vec<BranchProtectionRule>, branch: &str) -> Self {
        rules
            .into_iter()
            .find(|rule| rule.pattern == branch)
            .map_or(RuleState::NotFound, RuleState::Found)
    }
}

fn already_satisfied(rule: &BranchProtectionRule, contexts: &RequiredStatusCheckSet) -> bool {
    rule.requires_status_checks
        && rule.requires_strict_status_checks
        && contexts.same_as(&rule.required_status_check_contexts)
}

// ---------------------------------------------------------------------------
// Protector
// ---------------------------------------------------------------------------

/// Applies a [`ContextPolicy`] to the default branch of repositories in one
/// organization.
pub struct Protector<'a> {
    api: &'a dyn BranchProtectionApi,
    policy: &'a ContextPolicy,
    org: &'a str,
    lang_variable: &'a str,
    dry_run: bool,
}

impl<'a> Protector<'a> {
    pub fn new(
        api: &'a dyn BranchProtectionApi,
        policy: &'a ContextPolicy,
        org: &'a str,
        lang_variable: &'a str,
    ) -> Self {
        Self {
            api,
            policy,
            org,
            lang_variable,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Language from the repository variable, then the manifest's declared
    /// language. A lookup error is treated like an unset variable.
    pub fn detect_language(&self, request: &RepositoryRequest) -> Option<String> {
        let repo = &request.name;
        match self.api.repository_variable(self.org, repo, self.lang_variable) {
            Ok(Some(value)) if !value.trim().is_empty() => return Some(value.trim().to_string()),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(repo = %repo, variable = self.lang_variable, error = %err, "language variable lookup failed");
            }
        }
        match request.declared_language() {
            Some(language) => {
                tracing::debug!(repo = %repo, language, "using declared language");
                Some(language.to_string())
            }
            None => {
                tracing::warn!(repo = %repo, "no language detected; language contexts skipped");
                None
            }
        }
    }

    /// Run the state machine for one repository.
    pub fn protect(
        &self,
        request: &RepositoryRequest,
        refspec: Option<&Refspec>,
    ) -> Result<ProtectionOutcome, ProtectionError> {
        let repo = &request.name;

        let repository_id = self
            .api
            .repository_id(self.org, repo)
            .map_err(|source| ProtectionError::RepositoryId { repo: repo.clone(), source })?;
        let branch = self
            .api
            .default_branch_name(self.org, repo)
            .map_err(|source| ProtectionError::DefaultBranch { repo: repo.clone(), source })?;
        let rules = self
            .api
            .branch_protection_rules(self.org, repo)
            .map_err(|source| ProtectionError::InspectRules { repo: repo.clone(), source })?;

        let language = self.detect_language(request);
        let refspec = refspec.map(Refspec::as_str);

        let (action, contexts, mutation) = match RuleState::inspect(rules, &branch) {
            RuleState::NotFound => {
                let contexts = self.policy.merge(&[], refspec, language.as_deref());
                let input = CreateRuleInput {
                    repository_id,
                    pattern: branch.clone(),
                    required_status_check_contexts: contexts.to_vec(),
                    requires_status_checks: true,
                    requires_strict_status_checks: true,
                };
                if self.dry_run {
                    (ProtectionAction::WouldCreate, contexts, None)
                } else {
                    let m = self
                        .api
                        .create_branch_protection_rule(&input)
                        .map_err(|source| ProtectionError::Mutation { repo: repo.clone(), source })?;
                    (ProtectionAction::Created, contexts, Some(m))
                }
            }
            RuleState::Found(rule) => {
                let contexts =
                    self.policy
                        .merge(&rule.required_status_check_contexts, refspec, language.as_deref());
                if already_satisfied(&rule, &contexts) {
                    (ProtectionAction::Unchanged, contexts, None)
                } else if self.dry_run {
                    (ProtectionAction::WouldUpdate, contexts, None)
                } else {
                    let input = UpdateRuleInput {
                        branch_protection_rule_id: rule.id,
                        pattern: branch.clone(),
                        required_status_check_contexts: contexts.to_vec(),
                        requires_status_checks: true,
                        requires_strict_status_checks: true,
                    };
                    let m = self
                        .api
                        .update_branch_protection_rule(&input)
                        .map_err(|source| ProtectionError::Mutation { repo: repo.clone(), source })?;
                    (ProtectionAction::Updated, contexts, Some(m))
                }
            }
        };

        let confirmed = match mutation {
            Some(RuleMutation::MissingRule) => {
                tracing::error!(repo = %repo, branch = %branch, "mutation response did not contain branchProtectionRule");
                false
            }
            Some(RuleMutation::Applied { .. }) | None => true,
        };
        tracing::info!(repo = %repo, branch = %branch, ?action, contexts = %contexts, "branch protection");

        Ok(ProtectionOutcome {
            repo: repo.clone(),
            branch,
            action,
            contexts,
            language,
            confirmed,
        })
    }
}

// ---------------------------------------------------------------------------
// protect_all
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionStatus {
    Done(ProtectionOutcome),
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionRun {
    pub repo: RepoName,
    pub status: ProtectionStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ProtectionSummary {
    pub runs: Vec<ProtectionRun>,
}

impl ProtectionSummary {
    /// Failed repositories and mutations that could not be confirmed.
    pub fn failures(&self) -> impl Iterator<Item = &ProtectionRun> {
        self.runs.iter().filter(|run| match &run.status {
            ProtectionStatus::Failed { .. } => true,
            ProtectionStatus::Done(outcome) => !outcome.confirmed,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Protect every repository of `manifest` in declaration order.
pub fn protect_all(
    protector: &Protector<'_>,
    manifest: &DeploymentManifest,
    fallback: Option<&Refspec>,
) -> ProtectionSummary {
    let mut summary = ProtectionSummary::default();
    for request in manifest.repositories() {
        let refspec = request.resolved_refspec(fallback);
        let status = match protector.protect(request, refspec) {
            Ok(outcome) => ProtectionStatus::Done(outcome),
            Err(err) => {
                tracing::error!(repo = %request.name, error = %err, "branch protection failed");
                ProtectionStatus::Failed {
                    message: err.to_string(),
                }
            }
        };
        summary.runs.push(ProtectionRun {
            repo: request.name.clone(),
            status,
        });
    }
    summary
}
