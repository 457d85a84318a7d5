//! Diarykeep error types

use thiserror::Error;

/// Diarykeep error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (a required credential or setting is missing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider reachable but returned an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Upstream service answered with a non-success HTTP status
    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Insight generation failed; no partial result exists
    #[error("Failed to generate insight: {0}")]
    Generation(String),

    /// Remote store unreachable or unconfigured
    #[error("Remote store unavailable: {0}")]
    StoreUnavailable(String),

    /// Local cache error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a retry could plausibly succeed.
    ///
    /// Configuration errors are never transient. HTTP errors are transient
    /// when they are timeouts, connection failures, rate limits or server
    /// errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e
                        .status()
                        .map(|s| s.as_u16() == 429 || s.is_server_error())
                        .unwrap_or(false)
            }
            Error::Upstream { status, .. } => *status == 429 || *status >= 500,
            Error::StoreUnavailable(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for Diarykeep operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_not_transient() {
        let err = Error::Config("no completion api key".to_string());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Configuration error: no completion api key"
        );
    }

    #[test]
    fn test_generation_error_message() {
        let err = Error::Generation("rate limited".to_string());
        assert_eq!(err.to_string(), "Failed to generate insight: rate limited");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_upstream_status_classification() {
        let limited = Error::Upstream {
            status: 429,
            message: "slow down".to_string(),
        };
        let unavailable = Error::Upstream {
            status: 503,
            message: "maintenance".to_string(),
        };
        let bad_request = Error::Upstream {
            status: 400,
            message: "malformed".to_string(),
        };
        assert!(limited.is_transient());
        assert!(unavailable.is_transient());
        assert!(!bad_request.is_transient());
    }

    #[test]
    fn test_store_unavailable_is_transient() {
        assert!(Error::StoreUnavailable("offline".to_string()).is_transient());
    }
}
