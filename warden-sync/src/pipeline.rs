//! Per-repository deploy pipeline used by `warden deploy`.
//!
//! Repositories are processed sequentially in manifest order. A failure in
//! one repository is logged, appended to the CSV error log and recorded in the
//! [`DeploySummary`]; the run then moves on. Callers decide the exit status
//! from [`DeploySummary::failures`].

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use warden_core::{
    registry, DeployerConfig, DeploymentManifest, Refspec, RepoName, RepositoryRegistry,
    RepositoryRequest, WorkflowName,
};

use crate::apply::{apply, ApplyOutcome};
use crate::error::{io_err, SyncError};
use crate::git::SourceControl;
use crate::reconcile::{reconcile, ReconciliationResult};
use crate::snapshot::{SourceBundle, WorkflowDirState};
use crate::{error_log, report};

/// Everything a run needs, built once at startup and passed down.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub org: String,
    pub config: DeployerConfig,
    /// Scratch directory for clones.
    pub workspace: PathBuf,
    pub report_path: PathBuf,
    pub error_log_path: PathBuf,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(config: DeployerConfig, workspace: impl Into<PathBuf>) -> Self {
        Self {
            org: config.org.clone(),
            report_path: PathBuf::from(&config.report_path),
            error_log_path: PathBuf::from(&config.error_log_path),
            config,
            workspace: workspace.into(),
            dry_run: false,
            started_at: Utc::now(),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Why a repository was not processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Archived,
    /// Listed in an exclude list.
    Excluded,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Archived => f.write_str("archived"),
            SkipReason::Excluded => f.write_str("excluded"),
        }
    }
}

/// Terminal state of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryStatus {
    Deployed {
        plan: ReconciliationResult,
        outcome: ApplyOutcome,
    },
    Skipped(SkipReason),
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRun {
    pub repo: RepoName,
    pub refspec: Option<Refspec>,
    pub status: RepositoryStatus,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct DeploySummary {
    pub runs: Vec<RepositoryRun>,
    pub report: report::DeploymentReport,
}

impl DeploySummary {
    pub fn failures(&self) -> impl Iterator<Item = &RepositoryRun> {
        self.runs
            .iter()
            .filter(|r| matches!(r.status, RepositoryStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

// ---------------------------------------------------------------------------
// Bundle cache
// ---------------------------------------------------------------------------

/// Clones of the managed workflow repository, one per refspec per run.
#[derive(Debug, Default)]
pub struct BundleCache {
    bundles: BTreeMap<Option<Refspec>, SourceBundle>,
}

impl BundleCache {
    /// `<workspace>/bundles/<refspec with '/' → '_'>`
    pub fn bundle_dir(workspace: &Path, refspec: Option<&Refspec>) -> PathBuf {
        let leaf = refspec
            .map(|r| r.as_str().replace('/', "_"))
            .unwrap_or_else(|| "default".to_string());
        workspace.join("bundles").join(leaf)
    }

    pub fn get_or_clone(
        &mut self,
        ctx: &RunContext,
        scm: &dyn SourceControl,
        refspec: Option<&Refspec>,
    ) -> Result<&SourceBundle, SyncError> {
        match self.bundles.entry(refspec.cloned()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let dir = Self::bundle_dir(&ctx.workspace, refspec);
                fresh_dir(&dir)?;
                let source_repo = RepoName::from(ctx.config.managed_workflow_repo.as_str());
                scm.clone_repository(&ctx.org, &source_repo, refspec, &dir)?;
                Ok(e.insert(SourceBundle::load_at(&dir)?))
            }
        }
    }
}

/// `<workspace>/repos/<repo>`, kept apart from the bundle cache.
pub fn checkout_dir(workspace: &Path, repo: &RepoName) -> PathBuf {
    workspace.join("repos").join(&repo.0)
}

pub(crate) fn fresh_dir(dir: &Path) -> Result<(), SyncError> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    if let Some(parent) = dir.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// deploy_repository
// ---------------------------------------------------------------------------

/// Clone one repository, reconcile it against `bundle`, and apply the plan.
pub fn deploy_repository(
    ctx: &RunContext,
    scm: &dyn SourceControl,
    bundle: &SourceBundle,
    request: &RepositoryRequest,
) -> Result<(ReconciliationResult, ApplyOutcome), SyncError> {
    let checkout = checkout_dir(&ctx.workspace, &request.name);
    fresh_dir(&checkout)?;
    scm.clone_repository(&ctx.org, &request.name, None, &checkout)?;

    let destination = WorkflowDirState::load_at(&checkout)?;
    let plan = reconcile(
        &bundle.manifest,
        &request.optional_workflows,
        bundle,
        &destination,
        &ctx.config.managed_file_prefix,
    )?;
    tracing::info!(
        repo = %request.name,
        deploy = plan.to_deploy.len(),
        unchanged = plan.unchanged.len(),
        delete = plan.to_delete.len(),
        "reconciled"
    );
    let outcome = apply(scm, &checkout, bundle, &plan, ctx.dry_run)?;
    Ok((plan, outcome))
}

// ---------------------------------------------------------------------------
// deploy_all
// ---------------------------------------------------------------------------

/// Deploy every repository of `manifest`, then merge the results into the
/// persisted report (skipped in dry-run).
///
/// Returns `Err` only when the run cannot start (organization listing or
/// report loading failed); per-repository failures land in the summary.
pub fn deploy_all(
    ctx: &RunContext,
    registry_api: &dyn RepositoryRegistry,
    scm: &dyn SourceControl,
    manifest: &DeploymentManifest,
) -> Result<DeploySummary, SyncError> {
    let known = registry_api.list_repository_names(&ctx.org)?;
    let mut summary = DeploySummary {
        runs: Vec::new(),
        report: report::load_at(&ctx.report_path)?,
    };
    let fallback = registry::fallback_refspec(manifest, ctx.config.default_managed_refspec.as_ref());
    let stamp = report::timestamp(ctx.started_at);
    let mut bundles = BundleCache::default();

    for request in manifest.repositories() {
        let repo = &request.name;
        let refspec = request.resolved_refspec(fallback).cloned();
        let span = tracing::info_span!("repository", repo = %repo);
        let _enter = span.enter();

        let status = match process(ctx, registry_api, scm, &mut bundles, &known, request, refspec.as_ref()) {
            Ok(status) => status,
            Err(err) => {
                let message = err.to_string();
                tracing::error!(error = %message, "repository failed");
                if !ctx.dry_run {
                    if let Err(log_err) = error_log::append_at(&ctx.error_log_path, repo, &message, Utc::now()) {
                        tracing::warn!(error = %log_err, "could not append to error log");
                    }
                }
                RepositoryStatus::Failed { message }
            }
        };

        if let RepositoryStatus::Deployed { plan, .. } = &status {
            let deployed: Vec<WorkflowName> = plan.to_deploy.iter().map(|p| p.name.clone()).collect();
            let unchanged: Vec<WorkflowName> = plan.unchanged.iter().map(|p| p.name.clone()).collect();
            summary.report.record(repo, refspec.as_ref(), &deployed, &unchanged, &stamp);
        }

        summary.runs.push(RepositoryRun {
            repo: repo.clone(),
            refspec,
            status,
        });
    }

    if ctx.dry_run {
        tracing::info!("[dry-run] report not saved");
    } else {
        report::save_at(&ctx.report_path, &summary.report)?;
    }
    Ok(summary)
}

fn process(
    ctx: &RunContext,
    registry_api: &dyn RepositoryRegistry,
    scm: &dyn SourceControl,
    bundles: &mut BundleCache,
    known: &BTreeSet<RepoName>,
    request: &RepositoryRequest,
    refspec: Option<&Refspec>,
) -> Result<RepositoryStatus, SyncError> {
    if !known.contains(&request.name) {
        return Err(SyncError::RepositoryNotFound {
            org: ctx.org.clone(),
            repo: request.name.clone(),
        });
    }
    if registry_api.is_archived(&ctx.org, &request.name)? {
        tracing::info!("archived; skipping");
        return Ok(RepositoryStatus::Skipped(SkipReason::Archived));
    }
    let bundle = bundles.get_or_clone(ctx, scm, refspec)?;
    let (plan, outcome) = deploy_repository(ctx, scm, bundle, request)?;
    Ok(RepositoryStatus::Deployed { plan, outcome })
}
