//! Navigation hook: how the session layer tells the view layer to move.
//!
//! The session manager doesn't render anything. When a transition implies a
//! screen change (logged in → chat, logged out → login) it calls
//! [`Navigator::navigate`] and lets the front end decide what that means.

use std::fmt;

/// The screens the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    Chat,
    UserManagement,
}

impl Route {
    /// Returns `true` for screens that need a logged-in session.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Chat | Self::UserManagement)
    }

    /// The URL path of this screen.
    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Chat => "/chat",
            Self::UserManagement => "/user-management",
        }
    }

    /// Resolves a URL path to a route. Unknown paths go home.
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/login" => Self::Login,
            "/register" => Self::Register,
            "/chat" => Self::Chat,
            "/user-management" => Self::UserManagement,
            _ => Self::Home,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Receives navigation requests from the session manager.
///
/// Implemented for any `Fn(Route)` closure, so wiring a front end is
/// usually a one-liner:
///
/// ```rust
/// use chatline_session::{Navigator, Route};
///
/// let nav = |route: Route| println!("go to {route}");
/// nav.navigate(Route::Login);
/// ```
pub trait Navigator: Send + Sync + 'static {
    /// Called after the transition has been applied and persisted.
    fn navigate(&self, route: Route);
}

impl<F> Navigator for F
where
    F: Fn(Route) + Send + Sync + 'static,
{
    fn navigate(&self, route: Route) {
        self(route);
    }
}

/// A [`Navigator`] that ignores every request. For headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNavigation;

impl Navigator for NoNavigation {
    fn navigate(&self, route: Route) {
        tracing::trace!(%route, "navigation ignored");
    }
}
