//! The authentication state machine.

use std::fmt;

/// Where the client is in the login lifecycle.
///
/// ```text
///              login()                 success
///  Anonymous ───────────→ Authenticating ───────→ Authenticated
///      ↑                       │ failure                │
///      └───────────────────────┘                        │
///      └──────────── logout() / 401 on any call ────────┘
/// ```
///
/// A failed login returns to whatever settled state preceded it, so a
/// re-login attempt from Authenticated falls back to Authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No token. Protected routes redirect to login.
    Anonymous,
    /// A login request is in flight. Further logins are rejected.
    Authenticating,
    /// Token and user present.
    Authenticated,
}

impl AuthState {
    /// Returns `true` only in the Authenticated state.
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::Authenticating => write!(f, "Authenticating"),
            Self::Authenticated => write!(f, "Authenticated"),
        }
    }
}
