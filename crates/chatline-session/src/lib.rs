//! Session management for Chatline.
//!
//! This crate owns everything the client knows about "who is logged in":
//!
//! 1. **State machine**: [`AuthState`]: Anonymous, Authenticating,
//!    Authenticated.
//! 2. **Session manager**: [`SessionManager`]: login, logout,
//!    registration, anti-forgery token upkeep, and every authenticated
//!    backend call, with forced logout on a 401.
//! 3. **Navigation hook**: the [`Navigator`] trait, called on state
//!    transitions so the view layer can move between screens.
//!
//! # How it fits in the stack
//!
//! ```text
//! Views (above)  ← call SessionManager, subscribe to AuthState
//!     ↕
//! Session Layer (this crate)  ← state machine + persistence policy
//!     ↕                 ↕
//! API (chatline-api)   Store (chatline-store)
//! ```

mod error;
mod manager;
mod navigator;
mod state;

pub use chatline_store::Session;
pub use error::SessionError;
pub use manager::SessionManager;
pub use navigator::{NoNavigation, Navigator, Route};
pub use state::AuthState;
