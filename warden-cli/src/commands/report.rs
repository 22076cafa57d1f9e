//! `warden report`: show the persisted deployment report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use warden_sync::report;

use crate::GlobalArgs;

/// Arguments for `warden report`.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report file (default: `report_path` from the configuration).
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Repository")]
    repo: String,
    #[tabled(rename = "Refspec")]
    refspec: String,
    #[tabled(rename = "Workflow")]
    workflow: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl ReportArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let path = match self.path {
            Some(path) => path,
            None => PathBuf::from(global.load_config()?.report_path),
        };
        let report = report::load_at(&path)
            .with_context(|| format!("failed to load report {}", path.display()))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report JSON")?
            );
            return Ok(());
        }

        println!(
            "Warden v{} | {} repositories | {}",
            env!("CARGO_PKG_VERSION"),
            report.repositories.len(),
            path.display()
        );
        if report.repositories.is_empty() {
            println!("No deployments recorded.");
            return Ok(());
        }

        let mut rows = Vec::new();
        for (repo, entry) in &report.repositories {
            let refspec = entry
                .refspec
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string());
            for workflow in &entry.workflows {
                rows.push(ReportRow {
                    repo: repo.to_string(),
                    refspec: refspec.clone(),
                    workflow: workflow.name.to_string(),
                    updated: workflow
                        .updated
                        .clone()
                        .unwrap_or_else(|| "never".bright_black().to_string()),
                });
            }
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
