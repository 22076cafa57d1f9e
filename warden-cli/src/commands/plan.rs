//! `warden plan`: offline reconciliation of a local checkout against a local
//! managed-workflow bundle.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use warden_core::WorkflowName;
use warden_sync::diff::plan_diffs;
use warden_sync::{
    reconcile, FileClassification, ReconciliationResult, SourceBundle, WorkflowDirState,
};

use crate::GlobalArgs;

/// Arguments for `warden plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Checkout of the managed-workflow repository.
    #[arg(long)]
    pub bundle: PathBuf,

    /// Checkout of the target repository.
    #[arg(long)]
    pub checkout: PathBuf,

    /// Optional workflow requested by the repository (repeatable).
    #[arg(long = "optional", value_name = "NAME")]
    pub optional: Vec<String>,

    /// Print unified diffs for files that would be deployed.
    #[arg(long, conflicts_with = "json")]
    pub diff: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PlanJson<'a> {
    prefix: &'a str,
    settled: bool,
    #[serde(flatten)]
    plan: &'a ReconciliationResult,
}

impl PlanArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let prefix = config.managed_file_prefix.as_str();

        let bundle = SourceBundle::load_at(&self.bundle)
            .with_context(|| format!("failed to load bundle {}", self.bundle.display()))?;
        let destination = WorkflowDirState::load_at(&self.checkout)
            .with_context(|| format!("failed to read {}", self.checkout.display()))?;
        let requested: BTreeSet<WorkflowName> =
            self.optional.iter().map(|n| WorkflowName::from(n.as_str())).collect();

        let plan = reconcile(&bundle.manifest, &requested, &bundle, &destination, prefix)
            .context("reconciliation failed")?;

        if self.json {
            let payload = PlanJson {
                prefix,
                settled: plan.is_settled(),
                plan: &plan,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }

        if plan.is_settled() {
            println!("No changes for {}.", self.checkout.display());
            return Ok(());
        }
        for planned in &plan.to_deploy {
            let marker = match planned.classification {
                FileClassification::Absent => "+".green(),
                _ => "~".yellow(),
            };
            println!("{marker} {} ({})", planned.name, planned.category);
        }
        for name in &plan.to_delete {
            println!("{} {name}", "-".red());
        }
        for planned in &plan.unchanged {
            println!("{} {}", "·".bright_black(), planned.name);
        }

        if self.diff {
            for diff in plan_diffs(&plan, &bundle, &destination) {
                print!("{}", diff.unified_diff);
                if !diff.unified_diff.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }
}
