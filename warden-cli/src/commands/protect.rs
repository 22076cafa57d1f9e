//! `warden protect`: required status checks and secret access.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use warden_core::registry;
use warden_protection::{
    grant_all, protect_all, ContextPolicy, ProtectionAction, ProtectionStatus, Protector,
};

use super::github_client;
use crate::GlobalArgs;

/// Arguments for `warden protect`.
#[derive(Args, Debug)]
pub struct ProtectArgs {
    /// Deployment manifest listing modules and repositories.
    #[arg(long, default_value = registry::DEPLOYMENT_FILE)]
    pub manifest: PathBuf,

    /// Compute the rules without issuing mutations or secret updates.
    #[arg(long)]
    pub dry_run: bool,

    /// Leave organization secret access untouched.
    #[arg(long)]
    pub skip_secrets: bool,

    /// Token used for the GitHub API.
    #[arg(long, env = "GITHUB_APP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Tabled)]
struct ProtectionRow {
    #[tabled(rename = "Repository")]
    repo: String,
    #[tabled(rename = "Branch")]
    branch: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Contexts")]
    contexts: String,
}

impl ProtectArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let manifest = registry::load_deployment_at(&self.manifest)
            .with_context(|| format!("failed to load {}", self.manifest.display()))?;
        let client = github_client(&config, self.token);

        let policy = ContextPolicy::from_config(&config);
        let protector =
            Protector::new(&client, &policy, &config.org, &config.lang_variable).dry_run(self.dry_run);
        let fallback = registry::fallback_refspec(&manifest, config.default_managed_refspec.as_ref());
        let summary = protect_all(&protector, &manifest, fallback);

        let rows: Vec<ProtectionRow> = summary
            .runs
            .iter()
            .map(|run| match &run.status {
                ProtectionStatus::Done(outcome) => ProtectionRow {
                    repo: run.repo.to_string(),
                    branch: outcome.branch.clone(),
                    action: action_label(outcome.action, outcome.confirmed),
                    contexts: outcome.contexts.to_string(),
                },
                ProtectionStatus::Failed { message } => ProtectionRow {
                    repo: run.repo.to_string(),
                    branch: String::new(),
                    action: "FAILED".red().bold().to_string(),
                    contexts: message.clone(),
                },
            })
            .collect();
        if !rows.is_empty() {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }

        let mut failed = summary.failures().count();
        if self.skip_secrets {
            tracing::info!("secret access skipped");
        } else {
            let secrets = grant_all(&client, &config.org, &config, &manifest, self.dry_run);
            for grant in &secrets.grants {
                let verb = if grant.written {
                    "granted"
                } else if grant.added.is_empty() {
                    "already granted"
                } else {
                    "would grant"
                };
                println!("secret {}: {verb} ({} new)", grant.secret.bold(), grant.added.len());
            }
            for failure in &secrets.failures {
                println!("{} {failure}", "✗".red().bold());
            }
            failed += secrets.failures.len();
        }

        if failed > 0 {
            bail!("{failed} branch protection or secret operations failed");
        }
        Ok(())
    }
}

fn action_label(action: ProtectionAction, confirmed: bool) -> String {
    let label = match action {
        ProtectionAction::Created => "CREATED".green().to_string(),
        ProtectionAction::Updated => "UPDATED".green().to_string(),
        ProtectionAction::Unchanged => "UNCHANGED".bright_black().to_string(),
        ProtectionAction::WouldCreate => "WOULD CREATE".yellow().to_string(),
        ProtectionAction::WouldUpdate => "WOULD UPDATE".yellow().to_string(),
    };
    if confirmed {
        label
    } else {
        format!("{label} {}", "(unconfirmed)".red())
    }
}
