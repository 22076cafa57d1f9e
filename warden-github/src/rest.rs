//! REST adapter: organization repositories, Actions variables and
//! organization secret repository selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_core::{ApiError, RepoName, RepositoryRegistry, SecretAccessApi};

use crate::client::GitHubClient;

pub const PER_PAGE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionsVariable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectedRepositories {
    #[serde(default)]
    pub repositories: Vec<RepositoryRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub struct SelectedRepositoryIds<'a> {
    pub selected_repository_ids: &'a BTreeSet<u64>,
}

impl GitHubClient {
    fn repository(&self, org: &str, repo: &RepoName) -> Result<RepositorySummary, ApiError> {
        self.get_json(&format!("/repos/{org}/{repo}"))
    }

    pub(crate) fn actions_variable(
        &self,
        org: &str,
        repo: &RepoName,
        name: &str,
    ) -> Result<ActionsVariable, ApiError> {
        self.get_json(&format!("/repos/{org}/{repo}/actions/variables/{name}"))
    }
}

/// Walk the selected-repository pages until a short one. `total_count` is
/// not relied on.
fn selected_ids<F>(mut fetch: F) -> Result<BTreeSet<u64>, ApiError>
where
    F: FnMut(usize) -> Result<SelectedRepositories, ApiError>,
{
    let mut ids = BTreeSet::new();
    for page in 1.. {
        let batch = fetch(page)?;
        let last = batch.repositories.len() < PER_PAGE;
        ids.extend(batch.repositories.iter().map(|r| r.id));
        if last {
            break;
        }
    }
    Ok(ids)
}

impl RepositoryRegistry for GitHubClient {
    fn list_repository_names(&self, org: &str) -> Result<BTreeSet<RepoName>, ApiError> {
        let mut names = BTreeSet::new();
        for page in 1.. {
            let batch: Vec<RepositorySummary> = self.get_json(&format!(
                "/orgs/{org}/repos?type=all&per_page={PER_PAGE}&page={page}"
            ))?;
            let last = batch.len() < PER_PAGE;
            names.extend(batch.into_iter().map(|r| RepoName(r.name)));
            if last {
                break;
            }
        }
        tracing::debug!(org, count = names.len(), "listed organization repositories");
        Ok(names)
    }

    fn is_archived(&self, org: &str, repo: &RepoName) -> Result<bool, ApiError> {
        Ok(self.repository(org, repo)?.archived)
    }
}

impl SecretAccessApi for GitHubClient {
    fn repository_numeric_id(&self, org: &str, repo: &RepoName) -> Result<u64, ApiError> {
        Ok(self.repository(org, repo)?.id)
    }

    fn secret_repository_ids(&self, org: &str, secret: &str) -> Result<BTreeSet<u64>, ApiError> {
        selected_ids(|page| {
            self.get_json(&format!(
                "/orgs/{org}/actions/secrets/{secret}/repositories?per_page={PER_PAGE}&page={page}"
            ))
        })
    }

    fn set_secret_repository_ids(
        &self,
        org: &str,
        secret: &str,
        ids: &BTreeSet<u64>,
    ) -> Result<(), ApiError> {
        self.send_json_no_content(
            "PUT",
            &format!("/orgs/{org}/actions/secrets/{secret}/repositories"),
            &SelectedRepositoryIds {
                selected_repository_ids: ids,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn repository_summary_ignores_extra_fields() {
        let repo: RepositorySummary = serde_json::from_value(json!({
            "id": 42, "name": "api", "full_name": "acme/api",
            "archived": true, "default_branch": "main", "private": true
        }))
        .expect("decode");
        assert_eq!(repo.id, 42);
        assert!(repo.archived);
    }

    #[rstest]
    #[case::empty(json!({"total_count": 0, "repositories": []}), 0)]
    #[case::two(json!({"total_count": 2, "repositories": [{"id": 1, "name": "a"}, {"id": 2}]}), 2)]
    #[case::no_total(json!({"repositories": [{"id": 7}]}), 1)]
    fn selected_repositories_decode(#[case] body: serde_json::Value, #[case] expected: usize) {
        let selected: SelectedRepositories = serde_json::from_value(body).expect("decode");
        assert_eq!(selected.repositories.len(), expected);
    }

    #[test]
    fn selection_pages_until_short_page_without_total_count() {
        let mut requested = Vec::new();
        let ids = selected_ids(|page| {
            requested.push(page);
            let range = match page {
                1 => 0..PER_PAGE as u64,
                2 => 1000..1003,
                _ => panic!("page {page} should not be requested"),
            };
            let repositories: Vec<_> = range.map(|id| json!({ "id": id })).collect();
            Ok(serde_json::from_value(json!({ "repositories": repositories })).expect("decode"))
        })
        .expect("ids");
        assert_eq!(requested, [1, 2]);
        assert_eq!(ids.len(), PER_PAGE + 3);
        assert!(ids.contains(&1002));
    }

    #[test]
    fn selection_body_is_a_sorted_id_array() {
        let ids: BTreeSet<u64> = [30, 10, 20].into_iter().collect();
        let body = serde_json::to_value(SelectedRepositoryIds {
            selected_repository_ids: &ids,
        })
        .expect("serialize");
        assert_eq!(body, json!({"selected_repository_ids": [10, 20, 30]}));
    }

    #[test]
    fn variable_reads_value() {
        let variable: ActionsVariable = serde_json::from_value(json!({
            "name": "LANGUAGE", "value": "go", "created_at": "2024-01-01T00:00:00Z"
        }))
        .expect("decode");
        assert_eq!(variable.value, "go");
    }
}
