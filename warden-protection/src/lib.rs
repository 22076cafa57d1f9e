//! Branch protection and secret access for managed repositories.
//!
//! - [`contexts`]: ordered tag rules and the required status check union
//! - [`merger`]: per-repository create/update state machine
//! - [`secrets`]: organization secret grants

pub mod contexts;
pub mod error;
pub mod merger;
pub mod secrets;

pub use contexts::{ContextPolicy, RequiredStatusCheckSet, TagRule};
pub use error::ProtectionError;
pub use merger::{
    protect_all, ProtectionAction, ProtectionOutcome, ProtectionRun, ProtectionStatus,
    ProtectionSummary, Protector, RuleState,
};
pub use secrets::{grant_all, grant_secret, secret_targets, SecretGrant, SecretsSummary};
