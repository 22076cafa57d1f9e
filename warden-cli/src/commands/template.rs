//! `warden template`: enforce the organization's pull-request template.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use warden_core::RepoName;
use warden_sync::{enforce_all, CanonicalTemplate, RunContext, TemplateStatus};

use super::{git_cli, github_client, workspace_dir};
use crate::GlobalArgs;

/// Arguments for `warden template`.
#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Local canonical template (default: fetched from `policy_repo`).
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Repository to leave untouched (repeatable; adds to `pr_template_exclude`).
    #[arg(long = "exclude", value_name = "REPO")]
    pub exclude: Vec<String>,

    /// Scratch directory for clones (default: the user cache directory).
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Compare only; no commits, pushes or error-log rows.
    #[arg(long)]
    pub dry_run: bool,

    /// Token used for the GitHub API and git over HTTPS.
    #[arg(long, env = "GITHUB_APP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "Repository")]
    repo: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl TemplateArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let exclude: BTreeSet<RepoName> = config
            .pr_template_exclude
            .iter()
            .chain(&self.exclude)
            .map(|r| RepoName::from(r.as_str()))
            .collect();

        let client = github_client(&config, self.token.clone());
        let scm = git_cli(&config, self.token);
        let ctx = RunContext::new(config, workspace_dir(self.workspace)?).dry_run(self.dry_run);

        let canonical = match &self.template {
            Some(path) => CanonicalTemplate::load_at(path)
                .with_context(|| format!("failed to read template {}", path.display()))?,
            None => CanonicalTemplate::fetch(&ctx, &scm).with_context(|| {
                format!(
                    "failed to fetch {} from {}",
                    ctx.config.pr_template_source, ctx.config.policy_repo
                )
            })?,
        };
        tracing::info!(org = %ctx.org, template = %canonical.path.display(), dry_run = ctx.dry_run, "template enforcement started");

        let summary = enforce_all(&ctx, &client, &scm, &canonical, &exclude)
            .context("template enforcement failed")?;

        let rows: Vec<TemplateRow> = summary
            .runs
            .iter()
            .map(|run| TemplateRow {
                repo: run.repo.to_string(),
                result: match &run.status {
                    TemplateStatus::Enforced { .. } => run.status.to_string().green().to_string(),
                    TemplateStatus::WouldEnforce { .. } => run.status.to_string().yellow().to_string(),
                    TemplateStatus::Failed { .. } => run.status.to_string().red().to_string(),
                    TemplateStatus::Current { .. } | TemplateStatus::Skipped(_) => run.status.to_string(),
                },
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        let updated = summary.updated();
        let verb = if ctx.dry_run { "would update" } else { "updated" };
        println!("{verb} {} of {} repositories", updated.len(), summary.runs.len());

        let failed = summary.failures().count();
        if failed > 0 {
            bail!("{failed} repositories failed; see {}", ctx.error_log_path.display());
        }
        Ok(())
    }
}
