use std::path::PathBuf;

use anyhow::{Context, Result};

use warden_core::DeployerConfig;
use warden_github::GitHubClient;
use warden_sync::GitCli;

pub mod contexts;
pub mod deploy;
pub mod plan;
pub mod protect;
pub mod report;
pub mod template;

/// API client for the configured endpoint.
pub fn github_client(config: &DeployerConfig, token: Option<String>) -> GitHubClient {
    GitHubClient::new(token, config.http_timeout()).with_api_url(config.api_url.as_str())
}

/// Git over HTTPS against the configured host.
pub fn git_cli(config: &DeployerConfig, token: Option<String>) -> GitCli {
    GitCli::new(token).with_host(config.git_host.as_str())
}

/// `--workspace`, or `<cache dir>/warden`.
pub fn workspace_dir(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(dir) => Ok(dir),
        None => Ok(dirs::cache_dir()
            .context("could not determine cache directory; pass --workspace")?
            .join("warden")),
    }
}
