//! # Chatline
//!
//! Session-aware client for the Chatline chat backend.
//!
//! Chatline handles the parts of a chat client that aren't rendering:
//! logging in and out, keeping the session across restarts, attaching the
//! bearer and anti-forgery tokens to every request, and dropping the
//! session when the backend says it is no longer valid.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatline::prelude::*;
//!
//! # async fn run() -> Result<(), ChatlineError> {
//! chatline::init_tracing();
//!
//! let client = ChatlineBuilder::from_env()?.build()?;
//! client.start().await;
//!
//! if client.state().await == AuthState::Anonymous {
//!     client.login("alice", "secret").await?;
//! }
//! client.send_message("hello", None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | Crate | Concern |
//! |-------|---------|
//! | `chatline-protocol` | Wire types and the JSON codec |
//! | `chatline-store` | Durable and session-scoped storage |
//! | `chatline-api` | HTTP client for the backend |
//! | `chatline-session` | Auth state machine and session lifecycle |

mod client;
mod error;

pub use client::{Chatline, ChatlineBuilder, HOME_ENV, SESSION_FILE};
pub use error::ChatlineError;

pub use chatline_api as api;
pub use chatline_protocol as protocol;
pub use chatline_session as session;
pub use chatline_store as store;

use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "chatline=info";

/// Installs a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to [`DEFAULT_LOG_FILTER`]. Calling it twice (or after
/// another subscriber was installed) is harmless: the second call is a
/// no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Common imports for Chatline users.
///
/// ```rust
/// use chatline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Chatline, ChatlineBuilder, ChatlineError};

    pub use chatline_api::{ApiClient, ApiConfig, ApiError, Backend};
    pub use chatline_protocol::{
        Message, MessageId, NewMessage, Registration, User, UserId, UserPatch,
    };
    pub use chatline_session::{
        AuthState, NoNavigation, Navigator, Route, Session, SessionError, SessionManager,
    };
    pub use chatline_store::{FileStore, KeyValueStore, MemoryStore, SessionStore};
}
