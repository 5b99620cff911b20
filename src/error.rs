//! Error types for the REST collaborators.

use thiserror::Error;

/// Result type for backlog, auth and room requests.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur when talking to the chat API.
///
/// Transport failures are deliberately absent: they only ever surface as a
/// `ConnectionStatus::Disconnected` transition.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed or the body could not be decoded.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request needs a bearer token but the session holds none.
    #[error("not signed in")]
    NotSignedIn,
}
