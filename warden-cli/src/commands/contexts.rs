//! `warden contexts`: preview the merged required status check set.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use warden_protection::{ContextPolicy, RequiredStatusCheckSet};

use crate::GlobalArgs;

/// Arguments for `warden contexts`.
#[derive(Args, Debug)]
pub struct ContextsArgs {
    /// Refspec matched against the tag rules (first declared prefix wins).
    #[arg(long)]
    pub refspec: Option<String>,

    /// Repository language.
    #[arg(long)]
    pub language: Option<String>,

    /// Context the existing rule already requires (repeatable).
    #[arg(long = "existing", value_name = "CONTEXT")]
    pub existing: Vec<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ContextsJson<'a> {
    matched_prefix: Option<&'a str>,
    contexts: &'a RequiredStatusCheckSet,
}

impl ContextsArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let policy = ContextPolicy::from_config(&config);
        let refspec = self.refspec.as_deref();
        let merged = policy.merge(&self.existing, refspec, self.language.as_deref());

        if self.json {
            let payload = ContextsJson {
                matched_prefix: policy.tag_rule(refspec).map(|r| r.prefix.as_str()),
                contexts: &merged,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize contexts JSON")?
            );
            return Ok(());
        }
        for context in merged.iter() {
            println!("{context}");
        }
        Ok(())
    }
}
