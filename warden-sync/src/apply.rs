//! Effectful step: turn a [`ReconciliationResult`] into commits.
//!
//! ## Protocol
//!
//! 1. For each retired file: `git rm`, then commit
//!    `[skip actions] delete workflow(s) <name>`.
//! 2. Push the cleanup commits (only if there were any).
//! 3. Copy each file to deploy byte-for-byte into `.github/workflows/`
//!    (atomic `.tmp` + rename) and stage it.
//! 4. If the index shows staged changes, commit
//!    `[skip actions] added/updated workflow(s) <a, b, ...>` and push.
//!
//! Cleanup is always pushed before the deploy commit exists.

use std::path::{Path, PathBuf};

use warden_core::{atomic, WorkflowName};

use crate::error::SyncError;
use crate::git::SourceControl;
use crate::reconcile::ReconciliationResult;
use crate::snapshot::{workflow_dir, SourceBundle};

pub const COMMIT_PREFIX: &str = "[skip actions]";

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome for an individual workflow file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Copied into the checkout and staged.
    Written { name: WorkflowName },
    /// Already current; nothing to do.
    Unchanged { name: WorkflowName },
    /// `--dry-run`: the file *would* have been written.
    WouldWrite { name: WorkflowName },
    /// Retired and committed.
    Deleted { name: WorkflowName },
    /// `--dry-run`: the file *would* have been retired.
    WouldDelete { name: WorkflowName },
}

impl WriteResult {
    pub fn name(&self) -> &WorkflowName {
        match self {
            WriteResult::Written { name }
            | WriteResult::Unchanged { name }
            | WriteResult::WouldWrite { name }
            | WriteResult::Deleted { name }
            | WriteResult::WouldDelete { name } => name,
        }
    }
}

/// Everything `apply` did for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub writes: Vec<WriteResult>,
    /// A cleanup push happened.
    pub cleanup_pushed: bool,
    /// A deploy commit was created and pushed.
    pub deploy_pushed: bool,
}

pub fn delete_commit_message(name: &WorkflowName) -> String {
    format!("{COMMIT_PREFIX} delete workflow(s) {name}")
}

pub fn deploy_commit_message(names: &[&WorkflowName]) -> String {
    let list = names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{COMMIT_PREFIX} added/updated workflow(s) {list}")
}

fn relative(name: &WorkflowName) -> PathBuf {
    Path::new(".github").join("workflows").join(name.as_str())
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Apply `plan` to the checkout at `checkout`.
pub fn apply(
    scm: &dyn SourceControl,
    checkout: &Path,
    bundle: &SourceBundle,
    plan: &ReconciliationResult,
    dry_run: bool,
) -> Result<ApplyOutcome, SyncError> {
    let mut outcome = ApplyOutcome::default();

    // Steps 1-2: cleanup.
    for name in &plan.to_delete {
        if dry_run {
            tracing::info!(workflow = %name, "[dry-run] would delete");
            outcome.writes.push(WriteResult::WouldDelete { name: name.clone() });
            continue;
        }
        scm.remove(checkout, &relative(name))?;
        scm.commit(checkout, &delete_commit_message(name))?;
        tracing::info!(workflow = %name, "deleted");
        outcome.writes.push(WriteResult::Deleted { name: name.clone() });
    }
    if !dry_run && !plan.to_delete.is_empty() {
        scm.push(checkout)?;
        outcome.cleanup_pushed = true;
    }

    // Step 3: copy and stage.
    let dest_dir = workflow_dir(checkout);
    let mut staged = Vec::new();
    for planned in &plan.to_deploy {
        let name = &planned.name;
        if dry_run {
            tracing::info!(workflow = %name, category = %planned.category, "[dry-run] would write");
            outcome.writes.push(WriteResult::WouldWrite { name: name.clone() });
            continue;
        }
        let source = bundle
            .source(planned.category, name)
            .ok_or_else(|| SyncError::MissingSource {
                category: planned.category,
                name: name.clone(),
            })?;
        atomic::write_atomic(&dest_dir.join(name.as_str()), source)?;
        staged.push(relative(name));
        tracing::info!(workflow = %name, category = %planned.category, "wrote");
        outcome.writes.push(WriteResult::Written { name: name.clone() });
    }
    for planned in &plan.unchanged {
        outcome.writes.push(WriteResult::Unchanged {
            name: planned.name.clone(),
        });
    }

    if dry_run || staged.is_empty() {
        return Ok(outcome);
    }

    // Step 4: commit and push only if git sees a change.
    scm.stage(checkout, &staged)?;
    if !scm.has_staged_changes(checkout)? {
        tracing::debug!(checkout = %checkout.display(), "no workflow changes after copy; skipping commit");
        return Ok(outcome);
    }
    scm.commit(checkout, &deploy_commit_message(&plan.deploy_names()))?;
    scm.push(checkout)?;
    outcome.deploy_pushed = true;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_messages() {
        assert_eq!(
            delete_commit_message(&"managed-ci-old.yml".into()),
            "[skip actions] delete workflow(s) managed-ci-old.yml"
        );
        let a = WorkflowName::from("a.yml");
        let b = WorkflowName::from("b.yml");
        assert_eq!(
            deploy_commit_message(&[&a, &b]),
            "[skip actions] added/updated workflow(s) a.yml, b.yml"
        );
    }

    #[test]
    fn relative_path_is_under_github_workflows() {
        assert_eq!(relative(&"ci.yml".into()), Path::new(".github/workflows/ci.yml"));
    }
}
