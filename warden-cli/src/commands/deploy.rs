//! `warden deploy`: reconcile managed workflows across the organization.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use warden_core::registry;
use warden_sync::pipeline::RepositoryRun;
use warden_sync::{deploy_all, RepositoryStatus, RunContext, WriteResult};

use super::{git_cli, github_client, workspace_dir};
use crate::GlobalArgs;

/// Arguments for `warden deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Deployment manifest listing modules and repositories.
    #[arg(long, default_value = registry::DEPLOYMENT_FILE)]
    pub manifest: PathBuf,

    /// Scratch directory for clones (default: the user cache directory).
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Show what would change without committing, pushing or saving the report.
    #[arg(long)]
    pub dry_run: bool,

    /// Token used for the GitHub API and git over HTTPS.
    #[arg(long, env = "GITHUB_APP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl DeployArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let manifest = registry::load_deployment_at(&self.manifest)
            .with_context(|| format!("failed to load {}", self.manifest.display()))?;
        let workspace = workspace_dir(self.workspace)?;

        let client = github_client(&config, self.token.clone());
        let scm = git_cli(&config, self.token);
        let ctx = RunContext::new(config, workspace).dry_run(self.dry_run);
        tracing::info!(org = %ctx.org, workspace = %ctx.workspace.display(), dry_run = ctx.dry_run, "deploy started");

        let summary = deploy_all(&ctx, &client, &scm, &manifest).context("deploy failed")?;
        for run in &summary.runs {
            print_run(run, ctx.dry_run);
        }

        let failed = summary.failures().count();
        if failed > 0 {
            bail!(
                "{failed} of {} repositories failed; see {}",
                summary.runs.len(),
                ctx.error_log_path.display()
            );
        }
        Ok(())
    }
}

fn print_run(run: &RepositoryRun, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let repo = &run.repo;
    match &run.status {
        RepositoryStatus::Skipped(reason) => {
            println!("{prefix}{} '{repo}' {reason}; skipped", "-".bright_black());
        }
        RepositoryStatus::Failed { message } => {
            println!("{prefix}{} '{repo}' failed: {message}", "✗".red().bold());
        }
        RepositoryStatus::Deployed { plan, outcome } => {
            if plan.is_settled() {
                println!("{prefix}{} '{repo}' up to date", "✓".green());
                return;
            }
            println!(
                "{prefix}{} '{repo}' ({} deployed, {} deleted, {} unchanged)",
                "✓".green(),
                plan.to_deploy.len(),
                plan.to_delete.len(),
                plan.unchanged.len()
            );
            for write in &outcome.writes {
                match write {
                    WriteResult::Written { name } => println!("  ✎  {name}"),
                    WriteResult::WouldWrite { name } => println!("  ~  {name}"),
                    WriteResult::Deleted { name } => println!("  ✗  {name}"),
                    WriteResult::WouldDelete { name } => println!("  -  {name}"),
                    WriteResult::Unchanged { .. } => {}
                }
            }
        }
    }
}
