//! Workflow reconciliation: the pure decision step.
//!
//! Per-category policy:
//!
//! | category | missing at destination | present                              |
//! |----------|------------------------|--------------------------------------|
//! | template | deploy                 | never compared; always unchanged     |
//! | primary  | deploy                 | deploy iff fingerprint differs       |
//! | optional | deploy iff requested   | compare iff requested, else ignored  |
//!
//! Categories are evaluated template, optional, primary. A name appearing in
//! more than one category is reported once; a deploy decision wins over an
//! unchanged one.
//!
//! Deletion: a destination file is retired iff its name is outside the union
//! of all three manifest lists *and* it starts with the managed-file prefix.
//! Unprefixed files are never touched.

use std::collections::BTreeSet;

use serde::Serialize;

use warden_core::{ManagedWorkflowManifest, WorkflowCategory, WorkflowName};

use crate::error::SyncError;
use crate::fingerprint::{classify_bytes, FileClassification};
use crate::snapshot::{SourceBundle, WorkflowDirState};

/// One workflow file the plan mentions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedWorkflow {
    pub name: WorkflowName,
    pub category: WorkflowCategory,
    #[serde(serialize_with = "serialize_classification")]
    pub classification: FileClassification,
}

/// The plan for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub to_deploy: Vec<PlannedWorkflow>,
    pub unchanged: Vec<PlannedWorkflow>,
    pub to_delete: BTreeSet<WorkflowName>,
}

impl ReconciliationResult {
    /// Nothing to deploy and nothing to delete.
    pub fn is_settled(&self) -> bool {
        self.to_deploy.is_empty() && self.to_delete.is_empty()
    }

    pub fn deploy_names(&self) -> Vec<&WorkflowName> {
        self.to_deploy.iter().map(|p| &p.name).collect()
    }

    pub fn unchanged_names(&self) -> Vec<&WorkflowName> {
        self.unchanged.iter().map(|p| &p.name).collect()
    }
}

/// Compute the plan for one repository from in-memory snapshots.
///
/// Fails only when a file that must be compared or deployed has no source in
/// the bundle.
pub fn reconcile(
    manifest: &ManagedWorkflowManifest,
    requested_optional: &BTreeSet<WorkflowName>,
    bundle: &SourceBundle,
    destination: &WorkflowDirState,
    managed_prefix: &str,
) -> Result<ReconciliationResult, SyncError> {
    let mut result = ReconciliationResult::default();

    for name in &manifest.template_workflows {
        let dest = destination.get(name);
        let classification = match dest {
            Some(bytes) if !bytes.is_empty() => FileClassification::Current,
            _ => FileClassification::Absent,
        };
        if classification.needs_deploy() {
            require_source(bundle, WorkflowCategory::Template, name)?;
        }
        push(&mut result, name, WorkflowCategory::Template, classification);
    }

    for name in &manifest.optional_workflows {
        if !requested_optional.contains(name) {
            tracing::debug!(workflow = %name, "optional workflow not requested; ignoring");
            continue;
        }
        let source = require_source(bundle, WorkflowCategory::Optional, name)?;
        let classification = classify_bytes(source, destination.get(name));
        push(&mut result, name, WorkflowCategory::Optional, classification);
    }

    for name in &manifest.primary_workflows {
        let source = require_source(bundle, WorkflowCategory::Primary, name)?;
        let classification = classify_bytes(source, destination.get(name));
        push(&mut result, name, WorkflowCategory::Primary, classification);
    }

    let deployed: BTreeSet<WorkflowName> = result.to_deploy.iter().map(|p| p.name.clone()).collect();
    result.unchanged.retain(|p| !deployed.contains(&p.name));

    result.to_delete = retired(manifest, destination, managed_prefix);
    Ok(result)
}

/// Destination files that carry the prefix but left the manifest.
pub fn retired(
    manifest: &ManagedWorkflowManifest,
    destination: &WorkflowDirState,
    managed_prefix: &str,
) -> BTreeSet<WorkflowName> {
    let known = manifest.all_names();
    destination
        .names()
        .filter(|name| !known.contains(name) && name.has_prefix(managed_prefix))
        .cloned()
        .collect()
}

fn require_source<'a>(
    bundle: &'a SourceBundle,
    category: WorkflowCategory,
    name: &WorkflowName,
) -> Result<&'a [u8], SyncError> {
    bundle
        .source(category, name)
        .ok_or_else(|| SyncError::MissingSource {
            category,
            name: name.clone(),
        })
}

fn push(
    result: &mut ReconciliationResult,
    name: &WorkflowName,
    category: WorkflowCategory,
    classification: FileClassification,
) {
    let list = if classification.needs_deploy() {
        &mut result.to_deploy
    } else {
        &mut result.unchanged
    };
    if list.iter().any(|p| &p.name == name) {
        return;
    }
    tracing::debug!(workflow = %name, %category, ?classification, "classified");
    list.push(PlannedWorkflow {
        name: name.clone(),
        category,
        classification,
    });
}

fn serialize_classification<S: serde::Serializer>(
    c: &FileClassification,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.serialize_str(match c {
        FileClassification::Absent => "absent",
        FileClassification::Current => "current",
        FileClassification::Stale => "stale",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const PREFIX: &str = "managed-ci";

    fn names(list: &[&str]) -> Vec<WorkflowName> {
        list.iter().map(|n| WorkflowName::from(*n)).collect()
    }

    fn manifest(template: &[&str], primary: &[&str], optional: &[&str]) -> ManagedWorkflowManifest {
        ManagedWorkflowManifest {
            template_workflows: names(template),
            primary_workflows: names(primary),
            optional_workflows: names(optional),
        }
    }

    fn bundle(templates: &[(&str, &str)], workflows: &[(&str, &str)]) -> SourceBundle {
        let to_map = |files: &[(&str, &str)]| -> BTreeMap<WorkflowName, Vec<u8>> {
            files
                .iter()
                .map(|(n, b)| (WorkflowName::from(*n), b.as_bytes().to_vec()))
                .collect()
        };
        SourceBundle {
            templates: to_map(templates),
            workflows: to_map(workflows),
            ..SourceBundle::default()
        }
    }

    fn requested(list: &[&str]) -> BTreeSet<WorkflowName> {
        names(list).into_iter().collect()
    }

    fn strs(list: Vec<&WorkflowName>) -> Vec<&str> {
        list.into_iter().map(WorkflowName::as_str).collect()
    }

    #[test]
    fn primary_missing_identical_and_changed() {
        let m = manifest(&[], &["ci.yml"], &[]);
        let b = bundle(&[], &[("ci.yml", "on: push\n")]);
        let none = requested(&[]);

        let empty = WorkflowDirState::default();
        let r = reconcile(&m, &none, &b, &empty, PREFIX).expect("reconcile");
        assert_eq!(strs(r.deploy_names()), ["ci.yml"]);

        let same: WorkflowDirState = [("ci.yml", "on: push\n")].into_iter().collect();
        let r = reconcile(&m, &none, &b, &same, PREFIX).expect("reconcile");
        assert!(r.to_deploy.is_empty());
        assert_eq!(strs(r.unchanged_names()), ["ci.yml"]);

        let changed: WorkflowDirState = [("ci.yml", "on: pull_request\n")].into_iter().collect();
        let r = reconcile(&m, &none, &b, &changed, PREFIX).expect("reconcile");
        assert_eq!(strs(r.deploy_names()), ["ci.yml"]);
        assert_eq!(r.to_deploy[0].classification, FileClassification::Stale);
    }

    #[test]
    fn template_ignores_content_drift() {
        let m = manifest(&["pr.yml"], &[], &[]);
        let b = bundle(&[("pr.yml", "source")], &[]);
        let dest: WorkflowDirState = [("pr.yml", "edited by the team")].into_iter().collect();
        let r = reconcile(&m, &requested(&[]), &b, &dest, PREFIX).expect("reconcile");
        assert!(r.to_deploy.is_empty());
        assert_eq!(strs(r.unchanged_names()), ["pr.yml"]);
    }

    #[test]
    fn template_zero_bytes_is_redeployed() {
        let m = manifest(&["pr.yml"], &[], &[]);
        let b = bundle(&[("pr.yml", "source")], &[]);
        let dest: WorkflowDirState = [("pr.yml", "")].into_iter().collect();
        let r = reconcile(&m, &requested(&[]), &b, &dest, PREFIX).expect("reconcile");
        assert_eq!(strs(r.deploy_names()), ["pr.yml"]);
    }

    #[test]
    fn present_template_needs_no_source() {
        let m = manifest(&["pr.yml"], &[], &[]);
        let b = bundle(&[], &[]);
        let dest: WorkflowDirState = [("pr.yml", "x")].into_iter().collect();
        reconcile(&m, &requested(&[]), &b, &dest, PREFIX).expect("reconcile");
    }

    #[test]
    fn unrequested_optional_is_invisible() {
        let m = manifest(&[], &[], &["managed-ci-deploy.yml"]);
        let b = bundle(&[], &[("managed-ci-deploy.yml", "v2")]);
        let none = requested(&[]);
        for dest in [
            WorkflowDirState::default(),
            [("managed-ci-deploy.yml", "v2")].into_iter().collect(),
            [("managed-ci-deploy.yml", "v1")].into_iter().collect(),
        ] {
            let r = reconcile(&m, &none, &b, &dest, PREFIX).expect("reconcile");
            assert!(r.to_deploy.is_empty());
            assert!(r.unchanged.is_empty());
            assert!(r.to_delete.is_empty());
        }
    }

    #[test]
    fn requested_optional_is_compared() {
        let m = manifest(&[], &[], &["deploy.yml"]);
        let b = bundle(&[], &[("deploy.yml", "v2")]);
        let dest: WorkflowDirState = [("deploy.yml", "v1")].into_iter().collect();
        let r = reconcile(&m, &requested(&["deploy.yml"]), &b, &dest, PREFIX).expect("reconcile");
        assert_eq!(strs(r.deploy_names()), ["deploy.yml"]);
        assert_eq!(r.to_deploy[0].category, WorkflowCategory::Optional);
    }

    #[test]
    fn evaluation_order_is_template_optional_primary() {
        let m = manifest(&["t.yml"], &["p.yml"], &["o.yml"]);
        let b = bundle(&[("t.yml", "t")], &[("p.yml", "p"), ("o.yml", "o")]);
        let r = reconcile(&m, &requested(&["o.yml"]), &b, &WorkflowDirState::default(), PREFIX)
            .expect("reconcile");
        assert_eq!(strs(r.deploy_names()), ["t.yml", "o.yml", "p.yml"]);
    }

    #[test]
    fn cross_category_duplicates_collapse_and_deploy_wins() {
        // Present as a template (unchanged) but stale as a primary.
        let m = manifest(&["ci.yml"], &["ci.yml"], &[]);
        let b = bundle(&[("ci.yml", "new")], &[("ci.yml", "new")]);
        let dest: WorkflowDirState = [("ci.yml", "old")].into_iter().collect();
        let r = reconcile(&m, &requested(&[]), &b, &dest, PREFIX).expect("reconcile");
        assert_eq!(strs(r.deploy_names()), ["ci.yml"]);
        assert!(r.unchanged.is_empty());
    }

    #[test]
    fn deletion_requires_prefix_and_absence_from_manifest() {
        let m = manifest(&[], &["managed-ci-build.yml"], &["managed-ci-deploy.yml"]);
        let b = bundle(&[], &[("managed-ci-build.yml", "b"), ("managed-ci-deploy.yml", "d")]);
        let dest: WorkflowDirState = [
            ("managed-ci-build.yml", "b"),
            ("managed-ci-deploy.yml", "whatever"),
            ("managed-ci-old.yml", "retired"),
            ("team-release.yml", "hand written"),
        ]
        .into_iter()
        .collect();
        let r = reconcile(&m, &requested(&[]), &b, &dest, PREFIX).expect("reconcile");
        let deleted: Vec<_> = r.to_delete.iter().map(WorkflowName::as_str).collect();
        assert_eq!(deleted, ["managed-ci-old.yml"]);
    }

    #[test]
    fn missing_source_for_primary_is_an_error() {
        let m = manifest(&[], &["ci.yml"], &[]);
        let err = reconcile(&m, &requested(&[]), &bundle(&[], &[]), &WorkflowDirState::default(), PREFIX)
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingSource { .. }), "got: {err}");
        assert!(err.to_string().contains("ci.yml"));
    }

    #[test]
    fn plan_serializes_for_json_output() {
        let m = manifest(&[], &["ci.yml"], &[]);
        let b = bundle(&[], &[("ci.yml", "x")]);
        let r = reconcile(&m, &requested(&[]), &b, &WorkflowDirState::default(), PREFIX)
            .expect("reconcile");
        let yaml = serde_yaml::to_string(&r).expect("serialize");
        assert!(yaml.contains("classification: absent"), "got: {yaml}");
        assert!(yaml.contains("category: primary"), "got: {yaml}");
    }
}
