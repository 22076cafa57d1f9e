//! Unified diff previews for `warden plan --diff`.

use similar::TextDiff;

use warden_core::WorkflowName;

use crate::reconcile::ReconciliationResult;
use crate::snapshot::{SourceBundle, WorkflowDirState};

/// A single workflow diff, destination (`a/`) against bundle source (`b/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub name: WorkflowName,
    pub unified_diff: String,
}

/// Diff every file the plan would deploy. Missing destination files diff
/// against empty content; bytes that are not UTF-8 are shown lossily.
pub fn plan_diffs(
    plan: &ReconciliationResult,
    bundle: &SourceBundle,
    destination: &WorkflowDirState,
) -> Vec<FileDiff> {
    let mut diffs = Vec::new();
    for planned in &plan.to_deploy {
        let Some(source) = bundle.source(planned.category, &planned.name) else {
            continue;
        };
        let existing = destination.get(&planned.name).unwrap_or_default();
        let old = String::from_utf8_lossy(existing);
        let new = String::from_utf8_lossy(source);

        let rel = format!(".github/workflows/{}", planned.name);
        let old_header = format!("a/{rel}");
        let new_header = format!("b/{rel}");
        let unified = TextDiff::from_lines(old.as_ref(), new.as_ref())
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        diffs.push(FileDiff {
            name: planned.name.clone(),
            unified_diff: unified,
        });
    }
    diffs
}
