//! Typed errors.
//!
//! `ConfigError` is fatal and only raised during startup. `OracleError` is
//! per-call and never escapes the oracle client: it is folded into a
//! negative verdict there.

use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration problems. Any of these aborts the process before a
/// single turn is taken.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("conversation tree not found: {}", .0.display())]
    TreeNotFound(PathBuf),

    #[error("failed to read conversation tree {}: {source}", .path.display())]
    TreeRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in conversation tree: {0}")]
    TreeParse(#[from] serde_json::Error),

    #[error("conversation tree contains no nodes")]
    EmptyTree,

    #[error("duplicate node id '{0}' in conversation tree")]
    DuplicateNode(String),

    #[error("root node '{0}' not found in conversation tree")]
    RootNotFound(String),

    #[error("API key not found: set {0} in the environment or a .env file")]
    MissingCredential(&'static str),

    #[error("invalid setting {name}: {message}")]
    InvalidSetting { name: &'static str, message: String },
}

/// Failures talking to the model behind the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("{provider} API returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("response blocked by the model: {0}")]
    Blocked(String),

    #[error("local model error: {0}")]
    Local(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            // The request URL is dropped so it never reaches user-facing text.
            Self::Http(err.without_url())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_offending_item() {
        let err = ConfigError::RootNotFound("node1".into());
        assert_eq!(
            err.to_string(),
            "root node 'node1' not found in conversation tree"
        );

        let err = ConfigError::MissingCredential("GEMINI_API_KEY");
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn parse_errors_convert_into_config_errors() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ConfigError = parse.into();
        assert!(matches!(err, ConfigError::TreeParse(_)));
    }
}
