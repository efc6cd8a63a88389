//! Error types for the session lifecycle core

use crate::session::SessionId;

/// Failure to start an encoder process
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Invalid launch request: {0}")]
    InvalidInput(String),

    #[error("Encoder binary '{binary}' not found: {source}")]
    EncoderNotFound {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn encoder: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Encoder process has no pid (already reaped)")]
    MissingPid,
}

/// Failure while asking the remote platform about credentials
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Credential verification timed out")]
    Timeout,

    #[error("Unexpected response from platform: {0}")]
    UnexpectedResponse(String),
}

/// Failure to resolve a stream key through the platform API
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Automatic stream key resolution is not configured")]
    NotConfigured,

    #[error("Platform did not issue an access token")]
    TokenRejected,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Platform response is missing {0}")]
    MissingData(&'static str),
}

/// Errors surfaced by the session lifecycle manager and store
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid Twitch credentials")]
    InvalidCredentials,

    #[error("Failed to start stream: {0}")]
    StartFailed(String),

    #[error("Session {0} not found")]
    NotFound(SessionId),

    #[error("Session {0} already exists")]
    AlreadyExists(SessionId),

    #[error("Session manager is shutting down")]
    ShuttingDown,
}

impl From<LaunchError> for SessionError {
    fn from(e: LaunchError) -> Self {
        SessionError::StartFailed(e.to_string())
    }
}

impl From<ResolveError> for SessionError {
    fn from(e: ResolveError) -> Self {
        SessionError::StartFailed(format!("no stream key available: {}", e))
    }
}
