//! Unified error type for Chatline.

use chatline_api::ApiError;
use chatline_protocol::ProtocolError;
use chatline_session::SessionError;
use chatline_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `chatline` facade you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChatlineError {
    /// A wire-format error (encode, decode, invalid record).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Local storage could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A backend call failed, or the client is misconfigured.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ChatlineError {
    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Session(e) => e.user_message(),
            Self::Protocol(_) => "The server sent something we couldn't understand.".to_string(),
            Self::Store(_) => "Could not access local storage.".to_string(),
        }
    }

    /// Returns `true` if this error ended (or means there is no) session.
    pub fn requires_login(&self) -> bool {
        match self {
            Self::Api(e) => e.is_auth(),
            Self::Session(SessionError::Api(e)) => e.is_auth(),
            Self::Session(SessionError::NotAuthenticated) => true,
            _ => false,
        }
    }
}
