//! Error types for warden-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading manifests and configuration documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the file path and serde_yaml line context.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A configuration key is present but holds a value of the wrong shape.
    #[error("invalid value for configuration key '{key}': {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document did not exist at the expected path.
    #[error("document not found at {path}")]
    NotFound { path: PathBuf },
}

/// Errors reported by remote collaborators (GitHub REST and GraphQL).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Non-2xx status; the body is kept for the log.
    #[error("request to {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// GraphQL-level errors returned alongside a 2xx status.
    #[error("GraphQL errors: {}", messages.join("; "))]
    GraphQl { messages: Vec<String> },

    /// The requested object does not exist.
    #[error("{what} not found")]
    NotFound { what: String },
}

impl ApiError {
    /// True for "this thing does not exist" answers, regardless of how the
    /// remote phrased them.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiError::NotFound { .. } | ApiError::Status { status: 404, .. }
        )
    }
}

/// Convenience constructor for [`ConfigError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
