//! # warden-sync
//!
//! Managed workflow reconciliation and deployment.
//!
//! [`reconcile::reconcile`] is the pure decision step over in-memory
//! snapshots; [`apply::apply`] turns its plan into commits through a
//! [`git::SourceControl`]; [`pipeline::deploy_all`] drives a whole manifest
//! and merges the outcome into the persisted [`report`].
//! [`pr_template::enforce_all`] keeps every repository's pull-request
//! template in line with the policy repository.

pub mod apply;
pub mod diff;
pub mod error;
pub mod error_log;
pub mod fingerprint;
pub mod git;
pub mod pipeline;
pub mod pr_template;
pub mod reconcile;
pub mod report;
pub mod snapshot;

pub use apply::{ApplyOutcome, WriteResult};
pub use error::{ScmError, SyncError};
pub use fingerprint::FileClassification;
pub use git::{GitCli, SourceControl};
pub use pipeline::{deploy_all, DeploySummary, RepositoryStatus, RunContext, SkipReason};
pub use pr_template::{enforce_all, CanonicalTemplate, TemplateStatus, TemplateSummary};
pub use reconcile::{reconcile, PlannedWorkflow, ReconciliationResult};
pub use snapshot::{SourceBundle, WorkflowDirState};
