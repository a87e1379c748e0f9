// SPDX-License-Identifier: MIT

//! Typed errors for the model service clients.

use thiserror::Error;

/// Errors from the generative, embedding and reranking backends.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The service answered with a non-success status or an error payload.
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// The service answered but the payload did not have the expected shape.
    #[error("invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// Transport-level failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ModelError {
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn invalid(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is transient and the call is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ModelError::api("tgi", "overloaded");
        assert!(err.to_string().contains("tgi"));
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn test_retryability() {
        assert!(ModelError::api("tei", "503").is_retryable());
        assert!(!ModelError::invalid("tei", "missing field").is_retryable());
    }
}
