//! `ChatlineBuilder`: wires config, storage and navigation into a
//! ready-to-use [`SessionManager`].

use std::path::{Path, PathBuf};

use chatline_api::{ApiClient, ApiConfig};
use chatline_session::{Navigator, NoNavigation, SessionManager};
use chatline_store::{FileStore, MemoryStore, SessionStore};

use crate::ChatlineError;

/// Environment variable naming the directory that holds durable client
/// state.
pub const HOME_ENV: &str = "CHATLINE_HOME";

/// File inside the data directory that holds the durable session.
pub const SESSION_FILE: &str = "session.json";

const DEFAULT_HOME: &str = ".chatline";

/// A session manager talking HTTP to the real backend.
pub type Chatline<N = NoNavigation> = SessionManager<ApiClient, N>;

/// Builder for a [`Chatline`] client.
///
/// The token and user go to `<data dir>/session.json`; the anti-forgery
/// token is kept in memory only and is fetched again by every new client.
///
/// # Example
///
/// ```rust,no_run
/// use chatline::prelude::*;
///
/// # async fn run() -> Result<(), ChatlineError> {
/// let client = ChatlineBuilder::from_env()?
///     .navigator(|route: Route| println!("-> {route}"))
///     .build()?;
/// client.start().await;
/// client.login("alice", "secret").await?;
/// # Ok(())
/// # }
/// ```
pub struct ChatlineBuilder<N = NoNavigation> {
    config: ApiConfig,
    data_dir: PathBuf,
    navigator: N,
}

impl ChatlineBuilder<NoNavigation> {
    /// Creates a builder with default settings: backend on
    /// `localhost:3000`, data in `./.chatline`, no navigation.
    pub fn new() -> Self {
        Self {
            config: ApiConfig::default(),
            data_dir: PathBuf::from(DEFAULT_HOME),
            navigator: NoNavigation,
        }
    }

    /// Creates a builder from `CHATLINE_BASE_URL`, `CHATLINE_TIMEOUT_SECS`
    /// and `CHATLINE_HOME`.
    ///
    /// # Errors
    /// Returns [`ChatlineError::Api`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ChatlineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    /// Returns [`ChatlineError::Api`] if a variable is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatlineError> {
        let config = ApiConfig::from_lookup(&lookup)?;
        let mut builder = Self::new().config(config);
        if let Some(home) = lookup(HOME_ENV).filter(|h| !h.trim().is_empty()) {
            builder = builder.data_dir(home);
        }
        Ok(builder)
    }
}

impl Default for ChatlineBuilder<NoNavigation> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Navigator> ChatlineBuilder<N> {
    /// Replaces the whole API configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the backend base URL.
    ///
    /// # Errors
    /// Returns [`ChatlineError::Api`] if `url` isn't an absolute `http(s)` URL.
    pub fn base_url(mut self, url: &str) -> Result<Self, ChatlineError> {
        self.config = self.config.with_base_url(url)?;
        Ok(self)
    }

    /// Sets the directory holding durable client state.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the navigator called on session transitions.
    pub fn navigator<M: Navigator>(self, navigator: M) -> ChatlineBuilder<M> {
        ChatlineBuilder {
            config: self.config,
            data_dir: self.data_dir,
            navigator,
        }
    }

    /// The directory holding durable client state.
    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }

    /// Builds the client and hydrates it from the session file.
    ///
    /// Nothing touches the network yet; call
    /// [`SessionManager::start`] to fetch the anti-forgery token.
    ///
    /// # Errors
    /// Returns [`ChatlineError::Api`] if the HTTP client can't be built.
    pub fn build(self) -> Result<Chatline<N>, ChatlineError> {
        let path = self.data_dir.join(SESSION_FILE);
        tracing::debug!(
            base_url = %self.config.base_url,
            session_file = %path.display(),
            "building chatline client"
        );

        let store = SessionStore::new(FileStore::new(path), MemoryStore::new());
        let backend = ApiClient::new(self.config)?;
        Ok(SessionManager::new(backend, store, self.navigator))
    }
}
