//! Deployer configuration (`deployer-config.yaml`).
//!
//! Every key has a declared default. Looking up a key that is absent returns
//! the default, logs at debug level, and records a [`ConfigDiagnostic`] on the
//! loaded [`DeployerConfig`]. A key that is present with the wrong shape is a
//! hard [`ConfigError::InvalidValue`].
//!
//! `default_tag_status_context` is an *ordered* mapping: entries are kept in
//! declaration order because tag rules are evaluated first-match-wins.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::error::{io_err, ConfigError};
use crate::types::Refspec;

pub const DEFAULT_ORG: &str = "glcp";
pub const DEFAULT_MANAGED_WORKFLOW_REPO: &str = "managed-ci-workflow";
pub const DEFAULT_MANAGED_FILE_PREFIX: &str = "managed-ci";
pub const DEFAULT_LANG_VARIABLE: &str = "LANGUAGE";
pub const DEFAULT_REPORT_PATH: &str = "devops-reports/workflow-reports/workflows-deployed.yaml";
pub const DEFAULT_ERROR_LOG_PATH: &str = "error_log.csv";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GIT_HOST: &str = "github.com";
pub const DEFAULT_POLICY_REPO: &str = "org-policies";
pub const DEFAULT_PR_TEMPLATE_SOURCE: &str = "files/PULL_REQUEST_TEMPLATE.md";

/// A key that fell back to its declared default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDiagnostic {
    pub key: String,
    pub message: String,
}

/// One `prefix -> contexts` entry of `default_tag_status_context`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagContextEntry {
    pub prefix: String,
    pub contexts: Vec<String>,
}

/// Typed view of `deployer-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployerConfig {
    pub org: String,
    pub managed_workflow_repo: String,
    pub managed_file_prefix: String,
    pub default_managed_refspec: Option<Refspec>,
    pub required_status_check_contexts: Vec<String>,
    pub default_tag_status_context: Vec<TagContextEntry>,
    pub default_language_context: BTreeMap<String, Vec<String>>,
    pub lang_variable: String,
    pub common_secrets: Vec<String>,
    pub optional_secrets: BTreeMap<String, Vec<String>>,
    pub report_path: String,
    pub error_log_path: String,
    pub http_timeout_secs: u64,
    /// REST API root; GitHub Enterprise uses `https://<host>/api/v3`.
    pub api_url: String,
    /// Host used in clone URLs.
    pub git_host: String,
    /// Repository holding the canonical pull-request template.
    pub policy_repo: String,
    /// Path of the canonical template inside `policy_repo`.
    pub pr_template_source: String,
    /// Repositories never touched by template enforcement.
    pub pr_template_exclude: Vec<String>,
    /// Keys that were absent and took their default.
    pub diagnostics: Vec<ConfigDiagnostic>,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            org: DEFAULT_ORG.to_string(),
            managed_workflow_repo: DEFAULT_MANAGED_WORKFLOW_REPO.to_string(),
            managed_file_prefix: DEFAULT_MANAGED_FILE_PREFIX.to_string(),
            default_managed_refspec: None,
            required_status_check_contexts: Vec::new(),
            default_tag_status_context: Vec::new(),
            default_language_context: BTreeMap::new(),
            lang_variable: DEFAULT_LANG_VARIABLE.to_string(),
            common_secrets: Vec::new(),
            optional_secrets: BTreeMap::new(),
            report_path: DEFAULT_REPORT_PATH.to_string(),
            error_log_path: DEFAULT_ERROR_LOG_PATH.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            api_url: DEFAULT_API_URL.to_string(),
            git_host: DEFAULT_GIT_HOST.to_string(),
            policy_repo: DEFAULT_POLICY_REPO.to_string(),
            pr_template_source: DEFAULT_PR_TEMPLATE_SOURCE.to_string(),
            pr_template_exclude: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

impl DeployerConfig {
    /// Replace `org` when an override (e.g. `ORG_NAME`) is set and non-empty.
    pub fn with_org_override(mut self, org: Option<String>) -> Self {
        if let Some(org) = org.filter(|o| !o.trim().is_empty()) {
            tracing::debug!(org = %org, "organization overridden");
            self.org = org;
        }
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Secrets granted to a repository through its `needs` entries,
    /// deduplicated, in `needs` order.
    pub fn secrets_for_needs(&self, needs: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for need in needs {
            let Some(secrets) = self.optional_secrets.get(need) else {
                tracing::debug!(need = %need, "no optional secrets configured for need");
                continue;
            };
            for secret in secrets {
                if !out.contains(secret) {
                    out.push(secret.clone());
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

struct Lookup<'a> {
    raw: &'a Mapping,
    diagnostics: Vec<ConfigDiagnostic>,
}

impl<'a> Lookup<'a> {
    fn new(raw: &'a Mapping) -> Self {
        Self {
            raw,
            diagnostics: Vec::new(),
        }
    }

    fn value(&mut self, key: &str) -> Option<&'a Value> {
        match self.raw.get(key) {
            Some(Value::Null) | None => {
                tracing::debug!(key, "configuration key not set; using default");
                self.diagnostics.push(ConfigDiagnostic {
                    key: key.to_string(),
                    message: format!("{key} is not available in the deployer configuration"),
                });
                None
            }
            Some(v) => Some(v),
        }
    }

    fn get<T: DeserializeOwned>(&mut self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.value(key) {
            None => Ok(default),
            Some(v) => serde_yaml::from_value(v.clone()).map_err(|source| {
                ConfigError::InvalidValue {
                    key: key.to_string(),
                    source,
                }
            }),
        }
    }

    /// Ordered `map<string, list<string>>`, preserving declaration order.
    fn ordered_contexts(&mut self, key: &str) -> Result<Vec<TagContextEntry>, ConfigError> {
        let Some(v) = self.value(key) else {
            return Ok(Vec::new());
        };
        let map: Mapping = serde_yaml::from_value(v.clone()).map_err(|source| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                source,
            }
        })?;
        let mut out = Vec::with_capacity(map.len());
        for (k, v) in map {
            let prefix: String = serde_yaml::from_value(k).map_err(|source| {
                ConfigError::InvalidValue {
                    key: key.to_string(),
                    source,
                }
            })?;
            let contexts: Option<Vec<String>> =
                serde_yaml::from_value(v).map_err(|source| ConfigError::InvalidValue {
                    key: format!("{key}.{prefix}"),
                    source,
                })?;
            out.push(TagContextEntry {
                prefix,
                contexts: contexts.unwrap_or_default(),
            });
        }
        Ok(out)
    }
}

/// Build a typed configuration from a parsed YAML mapping.
pub fn from_mapping(raw: &Mapping) -> Result<DeployerConfig, ConfigError> {
    let d = DeployerConfig::default();
    let mut l = Lookup::new(raw);

    let config = DeployerConfig {
        org: l.get("org", d.org)?,
        managed_workflow_repo: l.get("managed_workflow_repo", d.managed_workflow_repo)?,
        managed_file_prefix: l.get("managed_file_prefix", d.managed_file_prefix)?,
        default_managed_refspec: l.get("default_managed_refspec", d.default_managed_refspec)?,
        required_status_check_contexts: l.get(
            "required_status_check_contexts",
            d.required_status_check_contexts,
        )?,
        default_tag_status_context: l.ordered_contexts("default_tag_status_context")?,
        default_language_context: l.get("default_language_context", d.default_language_context)?,
        lang_variable: l.get("lang_variable", d.lang_variable)?,
        common_secrets: l.get("common-secrets", d.common_secrets)?,
        optional_secrets: l.get("optional-secrets", d.optional_secrets)?,
        report_path: l.get("report_path", d.report_path)?,
        error_log_path: l.get("error_log_path", d.error_log_path)?,
        http_timeout_secs: l.get("http_timeout_secs", d.http_timeout_secs)?,
        api_url: l.get("api_url", d.api_url)?,
        git_host: l.get("git_host", d.git_host)?,
        policy_repo: l.get("policy_repo", d.policy_repo)?,
        pr_template_source: l.get("pr_template_source", d.pr_template_source)?,
        pr_template_exclude: l.get("pr_template_exclude", d.pr_template_exclude)?,
        diagnostics: Vec::new(),
    };

    Ok(DeployerConfig {
        diagnostics: l.diagnostics,
        ..config
    })
}

/// Parse a configuration document. An empty document yields all defaults.
pub fn parse(document: &str) -> Result<DeployerConfig, ConfigError> {
    let raw: Option<Mapping> = if document.trim().is_empty() {
        None
    } else {
        serde_yaml::from_str(document)?
    };
    from_mapping(&raw.unwrap_or_default())
}

/// Load the configuration at `path`.
pub fn load_at(path: &Path) -> Result<DeployerConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let raw: Option<Mapping> = if contents.trim().is_empty() {
        None
    } else {
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };
    from_mapping(&raw.unwrap_or_default())
}
