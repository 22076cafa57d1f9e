//! GraphQL branch-protection adapter.
//!
//! Queries are static documents; repository names and rule inputs travel as
//! typed `variables`, never interpolated into the query text.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use warden_core::{
    ApiError, BranchProtectionApi, BranchProtectionRule, CreateRuleInput, RepoName, RuleMutation,
    UpdateRuleInput,
};

use crate::client::GitHubClient;

pub const REPOSITORY_ID_QUERY: &str =
    "query($owner: String!, $name: String!) { repository(owner: $owner, name: $name) { id } }";

pub const DEFAULT_BRANCH_QUERY: &str = "query($owner: String!, $name: String!) { \
     repository(owner: $owner, name: $name) { defaultBranchRef { name } } }";

pub const PROTECTION_RULES_QUERY: &str = "query($owner: String!, $name: String!) { \
     repository(owner: $owner, name: $name) { branchProtectionRules(first: 100) { nodes { \
     id pattern requiredStatusCheckContexts requiresStatusChecks requiresStrictStatusChecks } } } }";

pub const CREATE_RULE_MUTATION: &str = "mutation($input: CreateBranchProtectionRuleInput!) { \
     createBranchProtectionRule(input: $input) { branchProtectionRule { \
     id pattern requiredStatusCheckContexts requiresStatusChecks requiresStrictStatusChecks } } }";

pub const UPDATE_RULE_MUTATION: &str = "mutation($input: UpdateBranchProtectionRuleInput!) { \
     updateBranchProtectionRule(input: $input) { branchProtectionRule { \
     id pattern requiredStatusCheckContexts requiresStatusChecks requiresStrictStatusChecks } } }";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Serialize)]
pub struct RepositoryVariables<'a> {
    pub owner: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct MutationVariables<'a, I> {
    pub input: &'a I,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<D> {
    pub data: Option<D>,
    #[serde(default)]
    pub errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlErrorMessage {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl<D> GraphQlResponse<D> {
    /// `data`, or the reported errors. A `NOT_FOUND` error maps to
    /// [`ApiError::NotFound`].
    pub fn into_data(self, url: &str) -> Result<D, ApiError> {
        if !self.errors.is_empty() {
            if let Some(missing) = self
                .errors
                .iter()
                .find(|e| e.kind.as_deref() == Some("NOT_FOUND"))
            {
                return Err(ApiError::NotFound {
                    what: missing.message.clone(),
                });
            }
            return Err(ApiError::GraphQl {
                messages: self.errors.into_iter().map(|e| e.message).collect(),
            });
        }
        self.data.ok_or_else(|| ApiError::Decode {
            url: url.to_string(),
            message: "response carried neither data nor errors".into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryData<R> {
    repository: Option<R>,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefaultBranchNode {
    default_branch_ref: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesNode {
    branch_protection_rules: Connection<BranchProtectionRule>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRuleData {
    create_branch_protection_rule: Option<RulePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRuleData {
    update_branch_protection_rule: Option<RulePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulePayload {
    branch_protection_rule: Option<IdNode>,
}

fn mutation_result(payload: Option<RulePayload>) -> RuleMutation {
    match payload.and_then(|p| p.branch_protection_rule) {
        Some(rule) => RuleMutation::Applied {
            rule_id: Some(rule.id),
        },
        None => RuleMutation::MissingRule,
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

impl GitHubClient {
    fn graphql<V: Serialize, D: DeserializeOwned>(
        &self,
        query: &str,
        variables: V,
    ) -> Result<D, ApiError> {
        let url = self.graphql_url();
        let request = GraphQlRequest { query, variables };
        let response: GraphQlResponse<D> = self.send_json("POST", &url, &request)?;
        response.into_data(&url)
    }

    fn repository_node<R: DeserializeOwned>(
        &self,
        query: &str,
        org: &str,
        repo: &RepoName,
    ) -> Result<R, ApiError> {
        let data: RepositoryData<R> = self.graphql(
            query,
            RepositoryVariables {
                owner: org,
                name: &repo.0,
            },
        )?;
        data.repository.ok_or_else(|| ApiError::NotFound {
            what: format!("repository {org}/{repo}"),
        })
    }
}

impl BranchProtectionApi for GitHubClient {
    fn repository_id(&self, org: &str, repo: &RepoName) -> Result<String, ApiError> {
        let node: IdNode = self.repository_node(REPOSITORY_ID_QUERY, org, repo)?;
        Ok(node.id)
    }

    fn default_branch_name(&self, org: &str, repo: &RepoName) -> Result<String, ApiError> {
        let node: DefaultBranchNode = self.repository_node(DEFAULT_BRANCH_QUERY, org, repo)?;
        node.default_branch_ref
            .map(|r| r.name)
            .ok_or_else(|| ApiError::NotFound {
                what: format!("default branch of {org}/{repo}"),
            })
    }

    fn branch_protection_rules(
        &self,
        org: &str,
        repo: &RepoName,
    ) -> Result<Vec<BranchProtectionRule>, ApiError> {
        let node: RulesNode = self.repository_node(PROTECTION_RULES_QUERY, org, repo)?;
        Ok(node.branch_protection_rules.nodes)
    }

    fn create_branch_protection_rule(
        &self,
        input: &CreateRuleInput,
    ) -> Result<RuleMutation, ApiError> {
        let data: CreateRuleData = self.graphql(CREATE_RULE_MUTATION, MutationVariables { input })?;
        Ok(mutation_result(data.create_branch_protection_rule))
    }

    fn update_branch_protection_rule(
        &self,
        input: &UpdateRuleInput,
    ) -> Result<RuleMutation, ApiError> {
        let data: UpdateRuleData = self.graphql(UPDATE_RULE_MUTATION, MutationVariables { input })?;
        Ok(mutation_result(data.update_branch_protection_rule))
    }

    fn repository_variable(
        &self,
        org: &str,
        repo: &RepoName,
        name: &str,
    ) -> Result<Option<String>, ApiError> {
        match self.actions_variable(org, repo, name) {
            Ok(variable) => Ok(Some(variable.value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_names_as_variables() {
        let request = GraphQlRequest {
            query: REPOSITORY_ID_QUERY,
            variables: RepositoryVariables {
                owner: "acme",
                name: "api\"} evil",
            },
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["variables"], json!({"owner": "acme", "name": "api\"} evil"}));
        assert!(!value["query"].as_str().unwrap_or_default().contains("acme"));
    }

    #[test]
    fn create_input_uses_graphql_field_names() {
        let input = CreateRuleInput {
            repository_id: "R_1".into(),
            pattern: "main".into(),
            required_status_check_contexts: vec!["build".into()],
            requires_status_checks: true,
            requires_strict_status_checks: true,
        };
        let value = serde_json::to_value(MutationVariables { input: &input }).expect("serialize");
        assert_eq!(
            value,
            json!({"input": {
                "repositoryId": "R_1",
                "pattern": "main",
                "requiredStatusCheckContexts": ["build"],
                "requiresStatusChecks": true,
                "requiresStrictStatusChecks": true
            }})
        );
    }

    #[test]
    fn rules_response_decodes() {
        let body = json!({"data": {"repository": {"branchProtectionRules": {"nodes": [
            {"id": "BPR_1", "pattern": "main", "requiredStatusCheckContexts": ["build"],
             "requiresStatusChecks": true, "requiresStrictStatusChecks": false}
        ]}}}});
        let response: GraphQlResponse<RepositoryData<RulesNode>> =
            serde_json::from_value(body).expect("decode");
        let rules = response
            .into_data("u")
            .expect("data")
            .repository
            .expect("repository")
            .branch_protection_rules
            .nodes;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "BPR_1");
        assert!(!rules[0].requires_strict_status_checks);
    }

    #[test]
    fn mutation_without_rule_is_reported() {
        let body = json!({"data": {"createBranchProtectionRule": {"branchProtectionRule": null}}});
        let response: GraphQlResponse<CreateRuleData> = serde_json::from_value(body).expect("decode");
        let data = response.into_data("u").expect("data");
        assert_eq!(mutation_result(data.create_branch_protection_rule), RuleMutation::MissingRule);

        let body = json!({"data": {"updateBranchProtectionRule": {"branchProtectionRule": {"id": "BPR_9"}}}});
        let response: GraphQlResponse<UpdateRuleData> = serde_json::from_value(body).expect("decode");
        let data = response.into_data("u").expect("data");
        assert_eq!(
            mutation_result(data.update_branch_protection_rule),
            RuleMutation::Applied { rule_id: Some("BPR_9".into()) }
        );
    }

    #[test]
    fn errors_take_precedence_over_data() {
        let body = json!({
            "data": {"repository": null},
            "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a Repository with the name 'acme/ghost'."}]
        });
        let response: GraphQlResponse<RepositoryData<IdNode>> =
            serde_json::from_value(body).expect("decode");
        let err = response.into_data("u").expect_err("not found");
        assert!(err.is_not_found());

        let body = json!({"errors": [{"message": "first"}, {"message": "second"}]});
        let response: GraphQlResponse<RepositoryData<IdNode>> =
            serde_json::from_value(body).expect("decode");
        match response.into_data("u") {
            Err(ApiError::GraphQl { messages }) => assert_eq!(messages, ["first", "second"]),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
