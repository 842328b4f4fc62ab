//! Error types surfaced to callers of the client

/// Failures of a marketplace API call.
///
/// Only the 401 → refresh → retry path is handled inside the client; every
/// variant here reaches the caller for presentation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network failure or timeout. Never retried by the client.
    #[error("transport error: {0}")]
    Transport(String),

    /// Renewal impossible or rejected. Stored credentials have been cleared.
    ///
    /// `message` is the server's wording from the 401 that started renewal.
    #[error("session expired: {reason}")]
    AuthExpired {
        reason: String,
        message: Option<String>,
    },

    /// Non-2xx response, passed through with the server's message when present.
    #[error("server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    /// 2xx response whose envelope reports `success: false`.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Message to show a user: the server's own wording when it sent one,
    /// otherwise `default`.
    pub fn user_message(&self, default: &str) -> String {
        match self {
            Error::Server {
                message: Some(message),
                ..
            }
            | Error::AuthExpired {
                message: Some(message),
                ..
            } => message.clone(),
            Error::Rejected(message) => message.clone(),
            _ => default.to_owned(),
        }
    }

    /// Whether the caller must treat the session as gone.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired { .. })
    }

    /// HTTP status for server-originated failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<marketplace_auth::Error> for Error {
    fn from(e: marketplace_auth::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
