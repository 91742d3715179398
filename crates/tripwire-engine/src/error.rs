//! Error types for the reconciliation engine

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tripwire_types::ConfigError;

use crate::applier::ApplyReport;

/// Error returned by a cloud API port
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloudError {
    /// Request rejected for exceeding the provider's rate quota
    #[error("Throttled: {message}")]
    Throttled { message: String },

    /// Provider returned an error response
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// Request never produced a response
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// A list API handed back a continuation token it already returned
    #[error("Pagination token {token:?} was returned twice")]
    RepeatedPageToken { token: String },
}

impl CloudError {
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled {
            message: message.into(),
        }
    }

    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether a retry after backoff may succeed
    pub fn is_throttling(&self) -> bool {
        match self {
            CloudError::Throttled { .. } => true,
            CloudError::Api { code, .. } => {
                matches!(code.as_str(), "Throttling" | "ThrottlingException" | "TooManyRequestsException")
            }
            _ => false,
        }
    }
}

/// Result type for cloud port calls
pub type CloudResult<T> = std::result::Result<T, CloudError>;

/// Errors that abort a reconciliation pass
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected before any API call
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The owned-alarm snapshot could not be read; nothing was applied
    #[error("Failed to fetch existing alarms with prefix {prefix:?}: {source}")]
    FetchExisting {
        prefix: String,
        #[source]
        source: CloudError,
    },

    /// The caller's deadline passed; `partial` holds what was applied so far
    #[error("Deadline exceeded during {phase}")]
    DeadlineExceeded {
        phase: &'static str,
        partial: Option<Box<ApplyReport>>,
    },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn deadline(phase: &'static str) -> Self {
        Self::DeadlineExceeded {
            phase,
            partial: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttling_classification() {
        assert!(CloudError::throttled("slow down").is_throttling());
        assert!(CloudError::api("ThrottlingException", "rate exceeded").is_throttling());
        assert!(!CloudError::api("ValidationError", "bad dimension").is_throttling());
        assert!(!CloudError::transport("connection reset").is_throttling());
    }

    #[test]
    fn test_fetch_error_names_prefix_and_cause() {
        let err = EngineError::FetchExisting {
            prefix: "tw-".to_string(),
            source: CloudError::transport("timed out"),
        };
        let msg = err.to_string();
        assert!(msg.contains("tw-"));
        assert!(msg.contains("timed out"));
    }
}
