//! Error types for ranger-dns.

use hickory_proto::op::ResponseCode;
use thiserror::Error;

/// Errors that can occur in the ranger DNS stage.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry request failed before a response arrived (connect, timeout, TLS).
    #[error("Registry transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Registry answered with a non-success HTTP status.
    #[error("Registry returned HTTP {code}")]
    Status {
        /// HTTP status code of the response.
        code: u16,
    },

    /// Registry body could not be decoded.
    #[error("Registry decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Cache not ready
    #[error("no services found with ranger DNS - initial sync incomplete")]
    NotReady,

    /// End of the handler chain reached without an answer.
    #[error("{0}: no next handler in chain")]
    NoNextHandler(&'static str),
}

impl DnsError {
    /// Response code the host should use when a handler fails with this error.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            DnsError::Config(_) => ResponseCode::Refused,
            DnsError::Proto(_) => ResponseCode::FormErr,
            _ => ResponseCode::ServFail,
        }
    }

    /// True for failures of a registry pull (recovered locally by the cache).
    pub fn is_registry_failure(&self) -> bool {
        matches!(
            self,
            DnsError::Transport(_) | DnsError::Status { .. } | DnsError::Decode(_)
        )
    }
}
