//! Warden: managed CI workflow deployment and branch protection for a GitHub
//! organization.
//!
//! # Usage
//!
//! ```text
//! warden deploy   [--manifest <file>] [--workspace <dir>] [--dry-run]
//! warden protect  [--manifest <file>] [--dry-run] [--skip-secrets]
//! warden plan     --bundle <dir> --checkout <dir> [--optional <name>]... [--diff] [--json]
//! warden contexts [--refspec <ref>] [--language <lang>] [--existing <ctx>]... [--json]
//! warden report   [--path <file>] [--json]
//! warden template [--template <file>] [--exclude <repo>]... [--workspace <dir>] [--dry-run]
//! ```
//!
//! Global: `--config <file>` (`WARDEN_CONFIG`), `--org <name>` (`ORG_NAME`),
//! `-v/--verbose`. Remote commands read `GITHUB_APP_TOKEN`.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use commands::{
    contexts::ContextsArgs, deploy::DeployArgs, plan::PlanArgs, protect::ProtectArgs,
    report::ReportArgs, template::TemplateArgs,
};
use warden_core::{config, ConfigError, DeployerConfig};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "Deploy managed CI workflows and required status checks across an organization",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile managed workflows into every repository of the deployment manifest.
    Deploy(DeployArgs),

    /// Merge required status check contexts into default-branch protection rules.
    Protect(ProtectArgs),

    /// Show what deploy would change for a local checkout.
    Plan(PlanArgs),

    /// Print the required status check set for a refspec and language.
    Contexts(ContextsArgs),

    /// Show the persisted deployment report.
    Report(ReportArgs),

    /// Enforce the canonical pull-request template across the organization.
    Template(TemplateArgs),
}

/// Options shared by every command.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Deployer configuration file.
    #[arg(long, global = true, env = "WARDEN_CONFIG", default_value = "deployer-config.yaml")]
    pub config: PathBuf,

    /// Organization to operate on; overrides `org` from the configuration.
    #[arg(long, global = true, env = "ORG_NAME")]
    pub org: Option<String>,

    /// Log at debug level (`RUST_LOG` takes precedence when set).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Load the configuration, falling back to declared defaults when the
    /// file does not exist.
    pub fn load_config(&self) -> Result<DeployerConfig> {
        let loaded = match config::load_at(&self.config) {
            Ok(cfg) => cfg,
            Err(ConfigError::NotFound { path }) => {
                tracing::warn!(path = %path.display(), "configuration file not found; using defaults");
                DeployerConfig::default()
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to load configuration from {}", self.config.display())
                })
            }
        };
        for diagnostic in &loaded.diagnostics {
            tracing::debug!(key = %diagnostic.key, "{}", diagnostic.message);
        }
        Ok(loaded.with_org_override(self.org.clone()))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    match cli.command {
        Commands::Deploy(args) => args.run(&cli.global),
        Commands::Protect(args) => args.run(&cli.global),
        Commands::Plan(args) => args.run(&cli.global),
        Commands::Contexts(args) => args.run(&cli.global),
        Commands::Report(args) => args.run(&cli.global),
        Commands::Template(args) => args.run(&cli.global),
    }
}
