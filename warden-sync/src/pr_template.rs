//! Pull-request template enforcement used by `warden template`.
//!
//! Every repository of the organization that is neither excluded nor archived
//! gets the canonical template from the policy repository. The repository's
//! own template is found at the first existing path of [`TEMPLATE_PATHS`];
//! when there is none the first path is created. A template whose
//! fingerprint already matches is left alone, and nothing is committed when
//! git sees no change after the copy.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;

use warden_core::{atomic, RepoName, RepositoryRegistry};

use crate::error::{io_err, SyncError};
use crate::error_log;
use crate::fingerprint::{self, FileClassification};
use crate::git::SourceControl;
use crate::pipeline::{checkout_dir, fresh_dir, RunContext, SkipReason};

/// Candidate template locations, relative to a checkout, in lookup order.
pub const TEMPLATE_PATHS: [&str; 2] = [
    ".github/PULL_REQUEST_TEMPLATE.md",
    ".github/pull_request_template.md",
];

pub const TEMPLATE_COMMIT_MESSAGE: &str = "[skip actions] PR Template Enforcement";

/// The template every repository must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTemplate {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl CanonicalTemplate {
    pub fn load_at(path: &Path) -> Result<Self, SyncError> {
        let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    /// Clone the policy repository into `<workspace>/policy/<repo>` and read
    /// the configured template from it.
    pub fn fetch(ctx: &RunContext, scm: &dyn SourceControl) -> Result<Self, SyncError> {
        let policy_repo = RepoName::from(ctx.config.policy_repo.as_str());
        let dir = ctx.workspace.join("policy").join(&policy_repo.0);
        fresh_dir(&dir)?;
        scm.clone_repository(&ctx.org, &policy_repo, None, &dir)?;
        Self::load_at(&dir.join(&ctx.config.pr_template_source))
    }
}

/// Relative path of the template in `checkout`: the first candidate that
/// exists as a file, else the first candidate.
pub fn template_path(checkout: &Path) -> PathBuf {
    TEMPLATE_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|relative| checkout.join(relative).is_file())
        .unwrap_or_else(|| PathBuf::from(TEMPLATE_PATHS[0]))
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Terminal state of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateStatus {
    /// The canonical template was committed and pushed.
    Enforced {
        path: PathBuf,
        previous: FileClassification,
    },
    /// `--dry-run`: the template *would* have been written.
    WouldEnforce {
        path: PathBuf,
        previous: FileClassification,
    },
    /// Already matching, or git saw no change after the copy.
    Current { path: PathBuf },
    Skipped(SkipReason),
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRun {
    pub repo: RepoName,
    pub status: TemplateStatus,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateSummary {
    pub runs: Vec<TemplateRun>,
}

impl TemplateSummary {
    pub fn failures(&self) -> impl Iterator<Item = &TemplateRun> {
        self.runs
            .iter()
            .filter(|r| matches!(r.status, TemplateStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Repositories that received (or in a dry run would receive) the template.
    pub fn updated(&self) -> Vec<&RepoName> {
        self.runs
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    TemplateStatus::Enforced { .. } | TemplateStatus::WouldEnforce { .. }
                )
            })
            .map(|r| &r.repo)
            .collect()
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateStatus::Enforced { path, previous } => {
                write!(f, "enforced {} (was {previous:?})", path.display())
            }
            TemplateStatus::WouldEnforce { path, previous } => {
                write!(f, "would enforce {} (was {previous:?})", path.display())
            }
            TemplateStatus::Current { path } => write!(f, "current {}", path.display()),
            TemplateStatus::Skipped(reason) => write!(f, "skipped ({reason})"),
            TemplateStatus::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// enforce
// ---------------------------------------------------------------------------

/// Clone `repo` and bring its pull-request template in line with `canonical`.
pub fn enforce_repository(
    ctx: &RunContext,
    scm: &dyn SourceControl,
    canonical: &CanonicalTemplate,
    repo: &RepoName,
) -> Result<TemplateStatus, SyncError> {
    let checkout = checkout_dir(&ctx.workspace, repo);
    fresh_dir(&checkout)?;
    scm.clone_repository(&ctx.org, repo, None, &checkout)?;

    let relative = template_path(&checkout);
    let target = checkout.join(&relative);
    let previous = fingerprint::classify(&canonical.path, Some(&target))?;
    if !previous.needs_deploy() {
        tracing::debug!(path = %relative.display(), "template already current");
        return Ok(TemplateStatus::Current { path: relative });
    }
    if ctx.dry_run {
        tracing::info!(path = %relative.display(), ?previous, "[dry-run] would enforce template");
        return Ok(TemplateStatus::WouldEnforce {
            path: relative,
            previous,
        });
    }

    atomic::write_atomic(&target, &canonical.bytes)?;
    scm.stage(&checkout, std::slice::from_ref(&relative))?;
    if !scm.has_staged_changes(&checkout)? {
        tracing::debug!(path = %relative.display(), "no template change after copy; skipping commit");
        return Ok(TemplateStatus::Current { path: relative });
    }
    scm.commit(&checkout, TEMPLATE_COMMIT_MESSAGE)?;
    scm.push(&checkout)?;
    tracing::info!(path = %relative.display(), ?previous, "template enforced");
    Ok(TemplateStatus::Enforced {
        path: relative,
        previous,
    })
}

/// Enforce the template across the organization, skipping `exclude` and
/// archived repositories.
///
/// Returns `Err` only when the organization cannot be listed; per-repository
/// failures land in the summary and the CSV error log.
pub fn enforce_all(
    ctx: &RunContext,
    registry_api: &dyn RepositoryRegistry,
    scm: &dyn SourceControl,
    canonical: &CanonicalTemplate,
    exclude: &BTreeSet<RepoName>,
) -> Result<TemplateSummary, SyncError> {
    let repos = registry_api.list_repository_names(&ctx.org)?;
    tracing::info!(
        org = %ctx.org,
        repositories = repos.len(),
        excluded = exclude.len(),
        "enforcing pull-request template"
    );
    let mut summary = TemplateSummary::default();

    for repo in repos {
        let span = tracing::info_span!("repository", repo = %repo);
        let _enter = span.enter();

        let status = if exclude.contains(&repo) {
            tracing::debug!("excluded");
            TemplateStatus::Skipped(SkipReason::Excluded)
        } else {
            match process(ctx, registry_api, scm, canonical, &repo) {
                Ok(status) => status,
                Err(err) => {
                    let message = err.to_string();
                    tracing::error!(error = %message, "repository failed");
                    if !ctx.dry_run {
                        if let Err(log_err) =
                            error_log::append_at(&ctx.error_log_path, &repo, &message, Utc::now())
                        {
                            tracing::warn!(error = %log_err, "could not append to error log");
                        }
                    }
                    TemplateStatus::Failed { message }
                }
            }
        };
        summary.runs.push(TemplateRun { repo, status });
    }
    Ok(summary)
}

fn process(
    ctx: &RunContext,
    registry_api: &dyn RepositoryRegistry,
    scm: &dyn SourceControl,
    canonical: &CanonicalTemplate,
    repo: &RepoName,
) -> Result<TemplateStatus, SyncError> {
    if registry_api.is_archived(&ctx.org, repo)? {
        tracing::info!("archived; skipping");
        return Ok(TemplateStatus::Skipped(SkipReason::Archived));
    }
    enforce_repository(ctx, scm, canonical, repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn upper_case_template_wins_over_lower_case() {
        let checkout = assert_fs::TempDir::new().expect("tempdir");
        assert_eq!(template_path(checkout.path()), Path::new(".github/PULL_REQUEST_TEMPLATE.md"));

        checkout.child(".github/pull_request_template.md").write_str("x").expect("write");
        assert_eq!(template_path(checkout.path()), Path::new(".github/pull_request_template.md"));

        checkout.child(".github/PULL_REQUEST_TEMPLATE.md").write_str("y").expect("write");
        assert_eq!(template_path(checkout.path()), Path::new(".github/PULL_REQUEST_TEMPLATE.md"));
    }

    #[test]
    fn directory_named_like_a_template_is_ignored() {
        let checkout = assert_fs::TempDir::new().expect("tempdir");
        checkout
            .child(".github/PULL_REQUEST_TEMPLATE.md")
            .create_dir_all()
            .expect("mkdir");
        checkout.child(".github/pull_request_template.md").write_str("x").expect("write");
        assert_eq!(template_path(checkout.path()), Path::new(".github/pull_request_template.md"));
    }

    #[test]
    fn missing_canonical_template_names_the_path() {
        let dir = assert_fs::TempDir::new().expect("tempdir");
        let err = CanonicalTemplate::load_at(&dir.path().join("files/PULL_REQUEST_TEMPLATE.md"))
            .unwrap_err();
        assert!(err.to_string().contains("PULL_REQUEST_TEMPLATE.md"), "got: {err}");
    }
}
