//! Error types for the Palaver client.

use palaver_protocol::ApiErrorBody;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the HTTP client and the session manager.
///
/// Transport-level WebSocket failures never appear here: the session
/// recovers from those internally by reconnecting.
#[derive(Debug, Error)]
pub enum Error {
    /// The stored token was rejected (HTTP 401). The token has been cleared;
    /// the caller should route the user back to login.
    #[error("unauthorized: {0}")]
    Unauthorized(ApiErrorBody),

    /// Any other non-2xx REST response, normalized into the uniform body.
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: ApiErrorBody },

    /// HTTP transport failure (connection refused, DNS, timeout).
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// HTTP status of the failed request, if this is an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized(_) => Some(401),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
