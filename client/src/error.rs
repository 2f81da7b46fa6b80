use thiserror::Error;

/// Failures surfaced to callers of the client library.
///
/// Transport-class errors are retryable; domain errors come from the
/// server's structured `code` field and map to caller decisions (prompt
/// re-login, show a validation message, and so on).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot reach the bridge server at {host}:{port} (connection refused); is badge-bridge-server running?")]
    ConnectionRefused { host: String, port: u16 },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("server did not respond within the request timeout")]
    Timeout,

    #[error("worker not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Server(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// True for socket-level failures the caller may simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionRefused { .. } | ClientError::Transport(_) | ClientError::Timeout
        )
    }
}
