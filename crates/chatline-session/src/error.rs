//! Error types for the session layer.

use chatline_api::ApiError;

/// Errors that can occur during session operations.
///
/// Backend failures pass through as [`SessionError::Api`]; the other
/// variants are conditions the session layer detects itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A login is already in flight. The second attempt is rejected
    /// immediately and never reaches the network.
    #[error("a login is already in progress")]
    AlreadyInProgress,

    /// The operation needs a logged-in session and there isn't one.
    #[error("not logged in")]
    NotAuthenticated,

    /// A mutating call needs an anti-forgery token and the backend
    /// wouldn't issue one. The next attempt fetches again.
    #[error("anti-forgery token unavailable")]
    AntiForgeryUnavailable,

    /// The response arrived after the session moved on (logout, or another
    /// login completed) and was discarded.
    #[error("request superseded by a newer session change")]
    Superseded,

    /// The backend call itself failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyInProgress => "Already logging in, please wait.".to_string(),
            Self::NotAuthenticated => "Please log in first.".to_string(),
            Self::AntiForgeryUnavailable => {
                "Could not get a security token from the server. Try again.".to_string()
            }
            Self::Superseded => "The session changed before the request finished.".to_string(),
            Self::Api(e) => e.user_message(),
        }
    }
}
