//! The persisted session and the adapter that keeps it in storage.

use std::fmt;

use chatline_protocol::{Codec, JsonCodec, User};

use crate::{KeyValueStore, StoreError};

/// Durable key holding the raw bearer token.
pub const TOKEN_KEY: &str = "token";
/// Durable key holding the JSON-serialized [`User`].
pub const USER_KEY: &str = "user";
/// Session-scoped key holding the raw anti-forgery token.
pub const CSRF_KEY: &str = "csrf";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// What the client knows about the current login.
///
/// `user` is only meaningful while `token` is present: no token means
/// logged out, whatever `user` says.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    pub anti_forgery_token: Option<String>,
}

impl Session {
    /// Returns `true` when both a token and a user are present.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// The user, but only if the session is actually logged in.
    pub fn current_user(&self) -> Option<&User> {
        self.token.as_ref().and(self.user.as_ref())
    }

    /// Drops the token and user, keeping the anti-forgery token.
    pub fn clear_auth(&mut self) {
        self.token = None;
        self.user = None;
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field(
                "anti_forgery_token",
                &self.anti_forgery_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Maps a [`Session`] onto a durable and a session-scoped [`KeyValueStore`].
///
/// ```text
/// durable:  token → "<raw token>"     user → {"id":"u1",...}
/// scoped:   csrf  → "<raw csrf token>"
/// ```
pub struct SessionStore {
    durable: Box<dyn KeyValueStore>,
    scoped: Box<dyn KeyValueStore>,
    codec: JsonCodec,
}

impl SessionStore {
    pub fn new(durable: impl KeyValueStore + 'static, scoped: impl KeyValueStore + 'static) -> Self {
        Self {
            durable: Box::new(durable),
            scoped: Box::new(scoped),
            codec: JsonCodec,
        }
    }

    /// Reads the session back from storage.
    ///
    /// Never fails: unreadable storage, an unparseable `user` record, or a
    /// `user` without a `token` all come back as absence.
    pub fn load(&self) -> Session {
        let token = read(self.durable.as_ref(), TOKEN_KEY).filter(|t| !t.is_empty());
        let user = token
            .as_ref()
            .and_then(|_| read(self.durable.as_ref(), USER_KEY))
            .and_then(|raw| self.decode_user(&raw));
        let anti_forgery_token = read(self.scoped.as_ref(), CSRF_KEY).filter(|t| !t.is_empty());

        Session {
            token,
            user,
            anti_forgery_token,
        }
    }

    /// Writes the session to storage.
    ///
    /// With a token: writes `token` and `user` (removing a stale `user` if
    /// the session has none). Without a token: removes both. The
    /// anti-forgery token is written (or removed) independently.
    ///
    /// # Errors
    /// Returns the first [`StoreError`] hit; later keys are not attempted.
    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        match &session.token {
            Some(token) => {
                self.durable.set(TOKEN_KEY, token)?;
                match &session.user {
                    Some(user) => {
                        let encoded = self.codec.encode_str(user)?;
                        self.durable.set(USER_KEY, &encoded)?;
                    }
                    None => self.durable.remove(USER_KEY)?,
                }
            }
            None => {
                self.durable.remove(TOKEN_KEY)?;
                self.durable.remove(USER_KEY)?;
            }
        }

        match &session.anti_forgery_token {
            Some(csrf) => self.scoped.set(CSRF_KEY, csrf),
            None => self.scoped.remove(CSRF_KEY),
        }
    }

    fn decode_user(&self, raw: &str) -> Option<User> {
        // Older clients wrote the literal string "undefined".
        if raw == "undefined" {
            return None;
        }
        match self.codec.decode_str::<User>(raw) {
            Ok(user) if user.validate().is_ok() => Some(user),
            Ok(_) => {
                tracing::warn!("stored user has no id, ignoring");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored user is malformed, ignoring");
                None
            }
        }
    }
}

fn read(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read from store, treating as absent");
            None
        }
    }
}
