//! Error types for the gateway.
//!
//! All failures are per-request values; nothing in this crate terminates the
//! host process. The orchestrator distinguishes errors it can recover from by
//! falling back to another provider (`triggers_fallback`) from errors that are
//! terminal for the request.

use thiserror::Error;

use crate::types::AttemptFailure;

/// Gateway error taxonomy.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// No configured provider satisfies the capabilities the request needs.
    /// This is a request-validation error and never causes a network call.
    #[error("no eligible provider: {0}")]
    NoEligibleProvider(String),

    /// Connection failure, non-2xx status, malformed sync body, or a timeout
    /// before any output was produced. Recovered via fallback.
    #[error("transport failure from provider '{provider}': {message}")]
    Transport { provider: String, message: String },

    /// The stream died after partial output was already delivered to the
    /// caller. Terminal: a different provider cannot coherently continue a
    /// partial answer.
    #[error("stream from provider '{provider}' failed after {delivered} delivered chunk(s): {message}")]
    PartialStream {
        provider: String,
        delivered: u64,
        message: String,
    },

    /// Every eligible candidate failed, or the deadline budget ran out before
    /// the remaining candidates could be tried.
    #[error("all providers exhausted after {} recorded attempt(s)", attempts.len())]
    AllProvidersExhausted { attempts: Vec<AttemptFailure> },

    /// Invalid or inconsistent injected configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request itself is malformed for the operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// HTTP client error outside an upstream's protocol (e.g. request build).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Streaming protocol error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Scratch resource acquisition failure.
    #[error("resource error: {0}")]
    Resource(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Whether the orchestrator may recover from this error by advancing to
    /// the next candidate provider. Request-level errors and terminal
    /// outcomes never trigger fallback.
    pub fn triggers_fallback(&self) -> bool {
        !matches!(
            self,
            Self::NoEligibleProvider(_)
                | Self::Configuration(_)
                | Self::InvalidParameter(_)
                | Self::PartialStream { .. }
                | Self::AllProvidersExhausted { .. }
        )
    }

    /// Convenience constructor for transport failures.
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_triggers_fallback() {
        let err = GatewayError::transport("local", "connection refused");
        assert!(err.triggers_fallback());
    }

    #[test]
    fn terminal_errors_do_not_trigger_fallback() {
        let partial = GatewayError::PartialStream {
            provider: "cloud".into(),
            delivered: 3,
            message: "connection reset".into(),
        };
        assert!(!partial.triggers_fallback());

        let exhausted = GatewayError::AllProvidersExhausted { attempts: vec![] };
        assert!(!exhausted.triggers_fallback());

        let invalid = GatewayError::InvalidParameter("missing prompt".into());
        assert!(!invalid.triggers_fallback());
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: GatewayError = json_err.into();
        assert!(matches!(err, GatewayError::Json(_)));
    }
}
