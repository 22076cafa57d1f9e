//! Blocking GitHub adapter for the warden ports.
//!
//! [`GitHubClient`] implements [`RepositoryRegistry`](warden_core::RepositoryRegistry)
//! and [`SecretAccessApi`](warden_core::SecretAccessApi) over REST, and
//! [`BranchProtectionApi`](warden_core::BranchProtectionApi) over GraphQL.
//! Every call is bounded by the agent timeout and is never retried.

pub mod client;
pub mod graphql;
pub mod rest;

pub use client::{GitHubClient, API_VERSION, DEFAULT_API_URL};
