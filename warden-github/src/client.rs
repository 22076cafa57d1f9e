//! HTTP transport shared by the REST and GraphQL adapters.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use warden_core::ApiError;

pub use warden_core::config::DEFAULT_API_URL;
pub const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("warden/", env!("CARGO_PKG_VERSION"));

/// Authenticated, blocking GitHub client with a per-request timeout.
#[derive(Clone)]
pub struct GitHubClient {
    agent: ureq::Agent,
    api_url: String,
    token: Option<String>,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl GitHubClient {
    pub fn new(token: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_url: DEFAULT_API_URL.to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Point the client at another API root (GitHub Enterprise).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    /// GraphQL endpoint. Enterprise servers serve REST under `/api/v3` and
    /// GraphQL under `/api/graphql`.
    pub(crate) fn graphql_url(&self) -> String {
        let root = self.api_url.trim_end_matches('/');
        match root.strip_suffix("/v3") {
            Some(base) => format!("{base}/graphql"),
            None => format!("{root}/graphql"),
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let request = self
            .agent
            .request(method, url)
            .set("Accept", ACCEPT)
            .set("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let response = self
            .request("GET", &url)
            .call()
            .map_err(|e| map_error(&url, e))?;
        decode(&url, response)
    }

    /// Send `body` to an absolute `url` and decode the JSON answer.
    pub(crate) fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        tracing::debug!(%url, method, "send");
        let response = self
            .request(method, url)
            .send_json(body)
            .map_err(|e| map_error(url, e))?;
        decode(url, response)
    }

    /// Send to an API `path` on an endpoint answering `204`.
    pub(crate) fn send_json_no_content<B: Serialize>(
        &self,
        method: &str,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let url = self.url(path);
        tracing::debug!(%url, method, "send");
        self.request(method, &url)
            .send_json(body)
            .map_err(|e| map_error(&url, e))?;
        Ok(())
    }
}

fn map_error(url: &str, err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            tracing::debug!(url, status, body = %body, "non-2xx response");
            ApiError::Status {
                url: url.to_string(),
                status,
                body,
            }
        }
        ureq::Error::Transport(transport) => ApiError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T, ApiError> {
    response.into_json::<T>().map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
