//! Error types for the API client.

/// Everything that can go wrong with a single backend call.
///
/// No retries happen anywhere: every variant is terminal for the call
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// 401 on an authenticated call, or any rejection of a login.
    /// The session layer tears the session down when it sees this.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// 4xx with a structured `{ "error": ... }` body. The message comes
    /// from the backend and is shown to the user verbatim.
    #[error("{0}")]
    Validation(String),

    /// 404 for the named resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// 5xx, an unexpected status, or a 2xx whose body had the wrong shape.
    #[error("server error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Server {
        status: Option<u16>,
        message: String,
    },

    /// The request could not be sent or the response not read.
    #[error("network error: {0}")]
    Network(String),

    /// The client was misconfigured (bad base URL, bad timeout, ...).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Returns `true` for errors that mean the session is no longer valid.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(message) | Self::Validation(message) => message.clone(),
            Self::NotFound(_) => "The requested item could not be found.".to_string(),
            Self::Server { .. } => "The server could not complete the request.".to_string(),
            Self::Network(_) => "Could not reach the server. Check your connection.".to_string(),
            Self::Config(message) => format!("Client is misconfigured: {message}"),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        // Builder errors are our fault, not the network's.
        if e.is_builder() {
            Self::Config(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
