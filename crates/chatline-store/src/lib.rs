//! Client-side persistence for Chatline sessions.
//!
//! A browser client keeps its session in two places: a durable store that
//! survives restarts, and a session-scoped store that is cleared when the
//! tab closes. This crate models both behind one small trait:
//!
//! 1. **Storage backends**: anything implementing [`KeyValueStore`]:
//!    [`MemoryStore`] (session-scoped) and [`FileStore`] (durable).
//! 2. **Session adapter**: [`SessionStore`] maps a [`Session`] onto those
//!    stores using fixed keys, and treats malformed data as absence.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← loads at startup, saves on every transition
//!     ↕
//! Store Layer (this crate)  ← token/user/csrf ↔ key/value pairs
//!     ↕
//! Protocol Layer (below)  ← User type + JsonCodec for the `user` record
//! ```

mod error;
mod file;
mod memory;
mod session;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use session::{CSRF_KEY, Session, SessionStore, TOKEN_KEY, USER_KEY};

use std::sync::Arc;

/// A synchronous string key/value store.
///
/// Methods take `&self` so a single store can be shared between the
/// session adapter and whoever else needs to look at it (tests, mostly).
/// Implementations use interior mutability.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the backing medium can't be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the backing medium can't be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the backing medium can't be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}
