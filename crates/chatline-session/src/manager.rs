//! The session manager: the single owner of authentication state.
//!
//! Responsibilities:
//! - Logging in and out, and keeping storage in sync with memory
//! - Fetching the anti-forgery token at startup and lazily before any
//!   mutating call
//! - Wrapping every authenticated backend call so a 401 tears the session
//!   down, whichever call received it
//! - Triggering navigation on transitions
//!
//! # Stale responses
//!
//! There is no request cancellation. Instead every login attempt gets an
//! attempt number, and every established session a generation number. A
//! response is applied only if the attempt/generation it started under is
//! still current when it resolves; otherwise it is discarded. This covers
//! "logout while login is in flight" and "401 for a token that has since
//! been replaced".
//!
//! # Concurrency note
//!
//! State lives behind a `tokio::sync::Mutex` that is never held across a
//! backend call, so a slow request doesn't block `logout()` or readers.

use chatline_api::{ApiError, AuthHeaders, Backend};
use chatline_protocol::{
    AuthGrant, Credentials, Message, MessageId, NewMessage, Registration, User, UserId, UserPatch,
};
use chatline_store::{Session, SessionStore};
use tokio::sync::{Mutex, watch};

use crate::{AuthState, Navigator, Route, SessionError};

/// Mutable state guarded by the manager's lock.
struct Inner {
    session: Session,

    /// Bumped whenever a session is established or torn down.
    generation: u64,

    /// The login attempt currently in flight, if any.
    login_attempt: Option<u64>,

    /// Source of attempt numbers.
    attempts: u64,
}

impl Inner {
    fn state(&self) -> AuthState {
        if self.login_attempt.is_some() {
            AuthState::Authenticating
        } else if self.session.is_authenticated() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        }
    }
}

/// Everything an authenticated call needs, captured under the lock so the
/// call itself can run without it.
struct Ticket {
    token: String,
    csrf: String,
    user_id: UserId,
    generation: u64,
}

impl Ticket {
    fn headers(&self) -> AuthHeaders<'_> {
        AuthHeaders {
            token: &self.token,
            csrf: &self.csrf,
        }
    }
}

/// Owns the client's session and mediates every backend call that
/// depends on it.
///
/// Construct one at startup and hand it (usually behind an `Arc`) to
/// whatever renders the UI. There is no global instance.
///
/// ## Lifecycle
///
/// ```text
/// new() ── hydrate from store ──→ start() ── fetch csrf
///                                    │
///            ┌──────── login() ──────┴────── register()
///            ▼
///      [Authenticated] ── update_profile / messages / users ...
///            │
///            └── logout() or 401 ──→ [Anonymous]
/// ```
pub struct SessionManager<B: Backend, N: Navigator> {
    backend: B,
    navigator: N,
    store: SessionStore,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<AuthState>,
}

impl<B: Backend, N: Navigator> SessionManager<B, N> {
    /// Creates a manager, hydrating the session from `store`.
    ///
    /// A stored token + user starts the manager Authenticated; anything
    /// else starts it Anonymous. No network activity happens here; call
    /// [`start`](Self::start) for that.
    pub fn new(backend: B, store: SessionStore, navigator: N) -> Self {
        let session = store.load();
        let inner = Inner {
            session,
            generation: 0,
            login_attempt: None,
            attempts: 0,
        };
        let state = inner.state();
        tracing::debug!(%state, "session hydrated from storage");

        let (state_tx, _) = watch::channel(state);
        Self {
            backend,
            navigator,
            store,
            inner: Mutex::new(inner),
            state_tx,
        }
    }

    /// Startup work: fetches the anti-forgery token. Never fails; a
    /// failure is logged and retried by the next mutating call.
    pub async fn start(&self) {
        self.refresh_anti_forgery_token().await;
    }

    // =====================================================================
    // Observers
    // =====================================================================

    /// The current state.
    pub async fn state(&self) -> AuthState {
        self.inner.lock().await.state()
    }

    /// A snapshot of the whole session.
    pub async fn session(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    /// The logged-in user, if any.
    pub async fn current_user(&self) -> Option<User> {
        self.inner.lock().await.session.current_user().cloned()
    }

    /// Subscribes to state changes. The receiver starts with the current
    /// state.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// The backend this manager talks to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resolves where a request for `route` should actually land:
    /// protected screens send users without a session to the login screen.
    ///
    /// Checks the session rather than [`state`](Self::state): a re-login in
    /// flight keeps the current session usable until it resolves.
    pub async fn guard(&self, route: Route) -> Route {
        let has_session = self.inner.lock().await.session.is_authenticated();
        if route.requires_auth() && !has_session {
            Route::Login
        } else {
            route
        }
    }

    // =====================================================================
    // Login / logout / register
    // =====================================================================

    /// Logs in with a username and password.
    ///
    /// On success the session is persisted and the navigator is sent to
    /// [`Route::Chat`]. On failure the session is left exactly as it was.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyInProgress`]: another login is in flight;
    ///   no request is made
    /// - [`SessionError::AntiForgeryUnavailable`]: no CSRF token
    /// - [`SessionError::Superseded`]: logout happened while waiting
    /// - [`SessionError::Api`]: the backend rejected the login
    pub async fn login(&self, username: &str, password: &str) -> Result<User, SessionError> {
        let attempt = {
            let mut inner = self.inner.lock().await;
            if inner.login_attempt.is_some() {
                tracing::debug!("login rejected, another attempt is in flight");
                return Err(SessionError::AlreadyInProgress);
            }
            inner.attempts += 1;
            let attempt = inner.attempts;
            inner.login_attempt = Some(attempt);
            self.publish(&inner);
            attempt
        };

        let credentials = Credentials::new(username, password);
        let result = self.request_grant(&credentials).await;

        let mut inner = self.inner.lock().await;
        if inner.login_attempt != Some(attempt) {
            tracing::debug!(attempt, "discarding stale login response");
            return Err(SessionError::Superseded);
        }
        inner.login_attempt = None;

        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                self.publish(&inner);
                tracing::info!(error = %e, "login failed");
                return Err(e);
            }
        };

        let user = grant.user;
        inner.session.token = Some(grant.token);
        inner.session.user = Some(user.clone());
        inner.generation += 1;
        self.persist(&inner.session);
        self.publish(&inner);
        drop(inner);

        tracing::info!(user_id = %user.id, "logged in");
        self.navigator.navigate(Route::Chat);
        Ok(user)
    }

    async fn request_grant(&self, credentials: &Credentials) -> Result<AuthGrant, SessionError> {
        let csrf = self.anti_forgery_token().await?;
        let grant = self.backend.authenticate(credentials, &csrf).await?;
        grant.user.validate().map_err(|e| ApiError::Server {
            status: None,
            message: e.to_string(),
        })?;
        // A blank token would be dropped by the store on the next load.
        if grant.token.trim().is_empty() {
            return Err(ApiError::Server {
                status: None,
                message: "login response is missing a token".into(),
            }
            .into());
        }
        Ok(grant)
    }

    /// Logs out: clears token and user from memory and storage, abandons
    /// any in-flight login, and navigates to [`Route::Login`]. Never fails.
    pub async fn logout(&self) {
        let mut inner = self.inner.lock().await;
        let was = inner.state();
        inner.session.clear_auth();
        inner.generation += 1;
        inner.login_attempt = None;
        self.persist(&inner.session);
        self.publish(&inner);
        drop(inner);

        tracing::info!(from = %was, "logged out");
        self.navigator.navigate(Route::Login);
    }

    /// Registers a new account. Does not log in; on success the navigator
    /// is sent to [`Route::Login`].
    ///
    /// # Errors
    /// [`SessionError::AntiForgeryUnavailable`], or
    /// [`SessionError::Api`] (typically `Validation`) from the backend.
    pub async fn register(&self, registration: &Registration) -> Result<(), SessionError> {
        let csrf = self.anti_forgery_token().await?;
        self.backend.register(registration, &csrf).await?;
        tracing::info!(username = %registration.username, "registered");
        self.navigator.navigate(Route::Login);
        Ok(())
    }

    // =====================================================================
    // Anti-forgery token
    // =====================================================================

    /// Fetches a fresh anti-forgery token and stores it.
    ///
    /// Returns `true` if a token was obtained. On failure the previous
    /// token (if any) is kept and the error is logged.
    pub async fn refresh_anti_forgery_token(&self) -> bool {
        match self.backend.fetch_anti_forgery_token().await {
            Ok(token) => {
                let mut inner = self.inner.lock().await;
                inner.session.anti_forgery_token = Some(token);
                self.persist(&inner.session);
                tracing::debug!("anti-forgery token refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch anti-forgery token");
                false
            }
        }
    }

    /// The current anti-forgery token, fetching one if there is none.
    async fn anti_forgery_token(&self) -> Result<String, SessionError> {
        if let Some(token) = self.inner.lock().await.session.anti_forgery_token.clone() {
            return Ok(token);
        }
        if !self.refresh_anti_forgery_token().await {
            return Err(SessionError::AntiForgeryUnavailable);
        }
        self.inner
            .lock()
            .await
            .session
            .anti_forgery_token
            .clone()
            .ok_or(SessionError::AntiForgeryUnavailable)
    }

    // =====================================================================
    // Authenticated operations
    // =====================================================================

    /// Updates the logged-in user's profile and replaces the stored user
    /// with what the backend returns.
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`], [`SessionError::AntiForgeryUnavailable`],
    /// or [`SessionError::Api`]. An `Auth` error also logs out.
    pub async fn update_profile(&self, patch: &UserPatch) -> Result<User, SessionError> {
        let ticket = self.mutating_ticket().await?;
        let result = self
            .backend
            .update_self(ticket.headers(), &ticket.user_id, patch)
            .await;
        let user = self.settle(&ticket, result).await?;

        let mut inner = self.inner.lock().await;
        if inner.generation == ticket.generation {
            inner.session.user = Some(user.clone());
            self.persist(&inner.session);
            tracing::info!(user_id = %user.id, "profile updated");
        } else {
            tracing::debug!("session changed during profile update, not storing result");
        }
        Ok(user)
    }

    /// Fetches any user by ID.
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`] or [`SessionError::Api`]. An
    /// `Auth` error also logs out.
    pub async fn fetch_user(&self, id: &UserId) -> Result<User, SessionError> {
        let ticket = self.ticket().await?;
        let result = self.backend.fetch_user(&ticket.token, id).await;
        self.settle(&ticket, result).await
    }

    /// Updates any user. Updating yourself goes through
    /// [`update_profile`](Self::update_profile) so the session stays in sync.
    ///
    /// # Errors
    /// Same as [`update_profile`](Self::update_profile).
    pub async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User, SessionError> {
        let ticket = self.mutating_ticket().await?;
        if *id == ticket.user_id {
            return self.update_profile(patch).await;
        }
        let result = self.backend.update_user(ticket.headers(), id, patch).await;
        self.settle(&ticket, result).await
    }

    /// Deletes a user. Deleting yourself also logs out.
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`], [`SessionError::AntiForgeryUnavailable`],
    /// or [`SessionError::Api`]. An `Auth` error also logs out.
    pub async fn delete_user(&self, id: &UserId) -> Result<(), SessionError> {
        let ticket = self.mutating_ticket().await?;
        let result = self.backend.delete_user(ticket.headers(), id).await;
        self.settle(&ticket, result).await?;

        tracing::info!(user_id = %id, "user deleted");
        if *id == ticket.user_id {
            self.end_session_if_current(ticket.generation).await;
        }
        Ok(())
    }

    /// Lists messages, optionally for one conversation.
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`] or [`SessionError::Api`]. An
    /// `Auth` error also logs out.
    pub async fn list_messages(&self, conversation_id: Option<&str>) -> Result<Vec<Message>, SessionError> {
        let ticket = self.ticket().await?;
        let result = self.backend.list_messages(&ticket.token, conversation_id).await;
        self.settle(&ticket, result).await
    }

    /// Posts a message.
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`], [`SessionError::AntiForgeryUnavailable`],
    /// or [`SessionError::Api`]. An `Auth` error also logs out.
    pub async fn send_message(&self, text: &str, conversation_id: Option<&str>) -> Result<Message, SessionError> {
        let ticket = self.mutating_ticket().await?;
        let message = NewMessage {
            text: text.to_string(),
            conversation_id: conversation_id.map(str::to_string),
        };
        let result = self.backend.send_message(ticket.headers(), &message).await;
        self.settle(&ticket, result).await
    }

    /// Deletes a message.
    ///
    /// # Errors
    /// Same as [`send_message`](Self::send_message).
    pub async fn delete_message(&self, id: &MessageId) -> Result<(), SessionError> {
        let ticket = self.mutating_ticket().await?;
        let result = self.backend.delete_message(ticket.headers(), id).await;
        self.settle(&ticket, result).await
    }

    /// Invites another user to chat.
    ///
    /// # Errors
    /// Same as [`send_message`](Self::send_message).
    pub async fn invite(&self, user_id: &UserId) -> Result<(), SessionError> {
        let ticket = self.mutating_ticket().await?;
        let result = self.backend.invite(ticket.headers(), user_id).await;
        self.settle(&ticket, result).await
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Snapshot for a read-only authenticated call.
    async fn ticket(&self) -> Result<Ticket, SessionError> {
        let inner = self.inner.lock().await;
        let (Some(token), Some(user)) = (&inner.session.token, &inner.session.user) else {
            return Err(SessionError::NotAuthenticated);
        };
        Ok(Ticket {
            token: token.clone(),
            csrf: inner.session.anti_forgery_token.clone().unwrap_or_default(),
            user_id: user.id.clone(),
            generation: inner.generation,
        })
    }

    /// Snapshot for a mutating call: also guarantees an anti-forgery token.
    async fn mutating_ticket(&self) -> Result<Ticket, SessionError> {
        // Fail fast before touching the network.
        self.ticket().await?;
        let csrf = self.anti_forgery_token().await?;
        let mut ticket = self.ticket().await?;
        ticket.csrf = csrf;
        Ok(ticket)
    }

    /// Applies the 401 policy to an authenticated call's result.
    async fn settle<T>(&self, ticket: &Ticket, result: Result<T, ApiError>) -> Result<T, SessionError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_auth() => {
                tracing::warn!(error = %e, "backend rejected the session, logging out");
                self.end_session_if_current(ticket.generation).await;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Logs out, unless the session has already been replaced or cleared
    /// since `generation` was captured.
    async fn end_session_if_current(&self, generation: u64) {
        let current = {
            let inner = self.inner.lock().await;
            inner.generation == generation && inner.session.token.is_some()
        };
        if current {
            self.logout().await;
        } else {
            tracing::debug!(generation, "session already changed, skipping logout");
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(session) {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state());
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionManager` against a scripted backend.
    //!
    //! Naming: `test_{function}_{scenario}_{expected}`.
    //!
    //! The scripted backend answers instantly unless its login gate is
    //! armed, in which case `authenticate` waits until the test releases
    //! it. That's how we hold a login "in flight" deterministically.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    use chatline_store::{CSRF_KEY, KeyValueStore, MemoryStore, TOKEN_KEY, USER_KEY};
    use tokio::sync::Notify;

    use super::*;

    // -- Scripted backend -------------------------------------------------

    struct Script {
        csrf: Result<String, ApiError>,
        grant: Result<AuthGrant, ApiError>,
        /// When set, every authenticated call fails with this error.
        authed_failure: Option<ApiError>,
        updated_user: User,
    }

    struct ScriptedBackend {
        script: StdMutex<Script>,
        login_gate: Option<Arc<Notify>>,
        csrf_calls: AtomicUsize,
        auth_calls: AtomicUsize,
        authed_calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                script: StdMutex::new(Script {
                    csrf: Ok("c1".into()),
                    grant: Ok(AuthGrant {
                        user: alice(),
                        token: "t1".into(),
                    }),
                    authed_failure: None,
                    updated_user: alice(),
                }),
                login_gate: None,
                csrf_calls: AtomicUsize::new(0),
                auth_calls: AtomicUsize::new(0),
                authed_calls: AtomicUsize::new(0),
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                login_gate: Some(gate),
                ..Self::new()
            }
        }

        fn edit(&self, f: impl FnOnce(&mut Script)) {
            f(&mut self.script.lock().unwrap());
        }

        fn authed<T>(&self, ok: T) -> Result<T, ApiError> {
            self.authed_calls.fetch_add(1, Ordering::SeqCst);
            match &self.script.lock().unwrap().authed_failure {
                Some(e) => Err(e.clone()),
                None => Ok(ok),
            }
        }
    }

    impl Backend for ScriptedBackend {
        async fn fetch_anti_forgery_token(&self) -> Result<String, ApiError> {
            self.csrf_calls.fetch_add(1, Ordering::SeqCst);
            self.script.lock().unwrap().csrf.clone()
        }

        async fn register(&self, _: &Registration, _: &str) -> Result<(), ApiError> {
            Ok(())
        }

        async fn authenticate(&self, _: &Credentials, _: &str) -> Result<AuthGrant, ApiError> {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.login_gate {
                gate.notified().await;
            }
            self.script.lock().unwrap().grant.clone()
        }

        async fn fetch_user(&self, _: &str, id: &UserId) -> Result<User, ApiError> {
            self.authed(User {
                id: id.clone(),
                ..alice()
            })
        }

        async fn update_user(&self, _: AuthHeaders<'_>, id: &UserId, _: &UserPatch) -> Result<User, ApiError> {
            self.authed(User {
                id: id.clone(),
                ..alice()
            })
        }

        async fn update_self(&self, _: AuthHeaders<'_>, _: &UserId, _: &UserPatch) -> Result<User, ApiError> {
            let user = self.script.lock().unwrap().updated_user.clone();
            self.authed(user)
        }

        async fn delete_user(&self, _: AuthHeaders<'_>, _: &UserId) -> Result<(), ApiError> {
            self.authed(())
        }

        async fn list_messages(&self, _: &str, _: Option<&str>) -> Result<Vec<Message>, ApiError> {
            self.authed(Vec::new())
        }

        async fn send_message(&self, _: AuthHeaders<'_>, message: &NewMessage) -> Result<Message, ApiError> {
            self.authed(Message {
                id: MessageId::new("m1"),
                text: message.text.clone(),
                author_user_id: UserId::new("u1"),
                conversation_id: message.conversation_id.clone(),
            })
        }

        async fn delete_message(&self, _: AuthHeaders<'_>, _: &MessageId) -> Result<(), ApiError> {
            self.authed(())
        }

        async fn invite(&self, _: AuthHeaders<'_>, _: &UserId) -> Result<(), ApiError> {
            self.authed(())
        }
    }

    // -- Helpers ----------------------------------------------------------

    type Routes = Arc<StdMutex<Vec<Route>>>;
    type Manager = SessionManager<ScriptedBackend, Box<dyn Fn(Route) + Send + Sync>>;

    fn alice() -> User {
        User {
            id: UserId::new("u1"),
            username: "alice".into(),
            email: "alice@example.com".into(),
            avatar_url: None,
        }
    }

    struct Harness {
        mgr: Manager,
        durable: Arc<MemoryStore>,
        scoped: Arc<MemoryStore>,
        routes: Routes,
    }

    fn harness_with(backend: ScriptedBackend, durable: Arc<MemoryStore>) -> Harness {
        let scoped = Arc::new(MemoryStore::new());
        let routes: Routes = Arc::default();
        let sink = Arc::clone(&routes);
        let navigator: Box<dyn Fn(Route) + Send + Sync> =
            Box::new(move |route| sink.lock().unwrap().push(route));
        let store = SessionStore::new(Arc::clone(&durable), Arc::clone(&scoped));
        Harness {
            mgr: SessionManager::new(backend, store, navigator),
            durable,
            scoped,
            routes,
        }
    }

    fn harness(backend: ScriptedBackend) -> Harness {
        harness_with(backend, Arc::new(MemoryStore::new()))
    }

    /// A harness that is already logged in as alice with token `t1`.
    async fn logged_in(backend: ScriptedBackend) -> Harness {
        let h = harness(backend);
        h.mgr.login("alice", "pw").await.expect("login succeeds");
        h
    }

    impl Harness {
        fn routes(&self) -> Vec<Route> {
            self.routes.lock().unwrap().clone()
        }

        fn durable_token(&self) -> Option<String> {
            self.durable.get(TOKEN_KEY).unwrap()
        }
    }

    // =====================================================================
    // new() / start()
    // =====================================================================

    #[tokio::test]
    async fn test_new_empty_store_starts_anonymous() {
        let h = harness(ScriptedBackend::new());
        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        assert_eq!(h.mgr.current_user().await, None);
    }

    #[tokio::test]
    async fn test_new_hydrates_authenticated_session() {
        let durable = Arc::new(MemoryStore::new());
        durable.set(TOKEN_KEY, "t0").unwrap();
        durable.set(USER_KEY, r#"{"id":"u1","username":"alice"}"#).unwrap();

        let h = harness_with(ScriptedBackend::new(), durable);

        assert_eq!(h.mgr.state().await, AuthState::Authenticated);
        assert_eq!(h.mgr.session().await.token.as_deref(), Some("t0"));
    }

    #[tokio::test]
    async fn test_new_token_without_user_is_not_authenticated() {
        let durable = Arc::new(MemoryStore::new());
        durable.set(TOKEN_KEY, "t0").unwrap();
        durable.set(USER_KEY, "{corrupt").unwrap();

        let h = harness_with(ScriptedBackend::new(), durable);

        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_start_fetches_csrf_into_scoped_store() {
        let h = harness(ScriptedBackend::new());
        h.mgr.start().await;

        assert_eq!(h.mgr.session().await.anti_forgery_token.as_deref(), Some("c1"));
        assert_eq!(h.scoped.get(CSRF_KEY).unwrap().as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_start_csrf_failure_is_non_fatal_and_keeps_previous() {
        let backend = ScriptedBackend::new();
        let h = harness(backend);
        h.mgr.start().await;

        h.mgr.backend().edit(|s| s.csrf = Err(ApiError::Network("refused".into())));
        assert!(!h.mgr.refresh_anti_forgery_token().await);

        assert_eq!(h.mgr.session().await.anti_forgery_token.as_deref(), Some("c1"));
    }

    // =====================================================================
    // login()
    // =====================================================================

    #[tokio::test]
    async fn test_login_success_persists_and_navigates_to_chat() {
        let h = harness(ScriptedBackend::new());

        let user = h.mgr.login("alice", "pw").await.expect("login succeeds");

        assert_eq!(user.id, UserId::new("u1"));
        assert_eq!(h.mgr.state().await, AuthState::Authenticated);
        let session = h.mgr.session().await;
        assert_eq!(session.token.as_deref(), Some("t1"));
        assert_eq!(session.user, Some(alice()));
        assert_eq!(h.durable_token().as_deref(), Some("t1"));
        assert_eq!(h.routes(), vec![Route::Chat]);
    }

    #[tokio::test]
    async fn test_login_fetches_csrf_lazily_once() {
        let h = harness(ScriptedBackend::new());
        h.mgr.login("alice", "pw").await.unwrap();
        h.mgr.send_message("hi", None).await.unwrap();

        assert_eq!(h.mgr.backend().csrf_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_rejected_returns_to_anonymous_unchanged() {
        let backend = ScriptedBackend::new();
        backend.edit(|s| s.grant = Err(ApiError::Auth("Invalid credentials".into())));
        let h = harness(backend);

        let err = h.mgr.login("alice", "wrong").await.unwrap_err();

        assert_eq!(err, SessionError::Api(ApiError::Auth("Invalid credentials".into())));
        assert_eq!(err.user_message(), "Invalid credentials");
        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        assert_eq!(h.durable_token(), None);
        assert!(h.routes().is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_while_authenticated_keeps_old_session() {
        let h = logged_in(ScriptedBackend::new()).await;
        h.mgr
            .backend()
            .edit(|s| s.grant = Err(ApiError::Auth("nope".into())));

        assert!(h.mgr.login("bob", "pw").await.is_err());

        assert_eq!(h.mgr.state().await, AuthState::Authenticated);
        assert_eq!(h.durable_token().as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_login_grant_with_blank_user_id_is_rejected() {
        let backend = ScriptedBackend::new();
        backend.edit(|s| {
            s.grant = Ok(AuthGrant {
                user: User {
                    id: UserId::new(""),
                    ..alice()
                },
                token: "t1".into(),
            });
        });
        let h = harness(backend);

        let err = h.mgr.login("alice", "pw").await.unwrap_err();

        assert!(matches!(err, SessionError::Api(ApiError::Server { .. })));
        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_login_grant_with_blank_token_is_rejected() {
        let backend = ScriptedBackend::new();
        backend.edit(|s| {
            s.grant = Ok(AuthGrant {
                user: alice(),
                token: "  ".into(),
            });
        });
        let h = harness(backend);

        let err = h.mgr.login("alice", "pw").await.unwrap_err();

        assert!(matches!(err, SessionError::Api(ApiError::Server { .. })));
        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        assert_eq!(h.mgr.session().await.token, None);
        assert_eq!(h.durable_token(), None);
        assert!(h.routes().is_empty());
    }

    #[tokio::test]
    async fn test_login_without_csrf_fails_and_retries_next_time() {
        let backend = ScriptedBackend::new();
        backend.edit(|s| s.csrf = Err(ApiError::Network("down".into())));
        let h = harness(backend);

        let err = h.mgr.login("alice", "pw").await.unwrap_err();
        assert_eq!(err, SessionError::AntiForgeryUnavailable);
        assert_eq!(h.mgr.backend().auth_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.mgr.state().await, AuthState::Anonymous);

        h.mgr.backend().edit(|s| s.csrf = Ok("c2".into()));
        h.mgr.login("alice", "pw").await.expect("second attempt succeeds");
        assert_eq!(h.mgr.backend().csrf_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_login_while_authenticating_returns_already_in_progress() {
        let gate = Arc::new(Notify::new());
        let h = harness(ScriptedBackend::gated(Arc::clone(&gate)));
        let mut states = h.mgr.subscribe();

        let first = h.mgr.login("alice", "pw");
        let second = async {
            states
                .wait_for(|s| *s == AuthState::Authenticating)
                .await
                .unwrap();
            let result = h.mgr.login("alice", "pw").await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), SessionError::AlreadyInProgress);
        assert_eq!(h.mgr.backend().auth_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.mgr.state().await, AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_login_response_after_logout_is_discarded() {
        let gate = Arc::new(Notify::new());
        let h = harness(ScriptedBackend::gated(Arc::clone(&gate)));
        let mut states = h.mgr.subscribe();

        let login = h.mgr.login("alice", "pw");
        let interrupt = async {
            states
                .wait_for(|s| *s == AuthState::Authenticating)
                .await
                .unwrap();
            h.mgr.logout().await;
            gate.notify_one();
        };
        let (result, ()) = tokio::join!(login, interrupt);

        assert_eq!(result.unwrap_err(), SessionError::Superseded);
        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        assert_eq!(h.durable_token(), None);
        assert_eq!(h.routes(), vec![Route::Login]);
    }

    // =====================================================================
    // logout()
    // =====================================================================

    #[tokio::test]
    async fn test_logout_after_login_clears_memory_and_storage() {
        let h = logged_in(ScriptedBackend::new()).await;

        h.mgr.logout().await;

        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        let session = h.mgr.session().await;
        assert_eq!(session.token, None);
        assert_eq!(session.user, None);
        assert_eq!(h.durable_token(), None);
        assert_eq!(h.durable.get(USER_KEY).unwrap(), None);
        assert_eq!(h.routes(), vec![Route::Chat, Route::Login]);
    }

    #[tokio::test]
    async fn test_logout_keeps_anti_forgery_token() {
        let h = logged_in(ScriptedBackend::new()).await;
        h.mgr.logout().await;
        assert_eq!(h.scoped.get(CSRF_KEY).unwrap().as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_logout_when_anonymous_is_harmless() {
        let h = harness(ScriptedBackend::new());
        h.mgr.logout().await;
        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        assert_eq!(h.routes(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn test_subscribe_sees_transitions() {
        let h = harness(ScriptedBackend::new());
        let rx = h.mgr.subscribe();
        assert_eq!(*rx.borrow(), AuthState::Anonymous);

        h.mgr.login("alice", "pw").await.unwrap();
        assert_eq!(*rx.borrow(), AuthState::Authenticated);

        h.mgr.logout().await;
        assert_eq!(*rx.borrow(), AuthState::Anonymous);
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[tokio::test]
    async fn test_register_does_not_log_in() {
        let h = harness(ScriptedBackend::new());
        let registration = Registration {
            username: "alice".into(),
            password: "pw".into(),
            email: "alice@example.com".into(),
            avatar_url: None,
        };

        h.mgr.register(&registration).await.expect("registers");

        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        assert_eq!(h.durable_token(), None);
        assert_eq!(h.routes(), vec![Route::Login]);
    }

    // =====================================================================
    // update_profile() and the 401 policy
    // =====================================================================

    #[tokio::test]
    async fn test_update_profile_replaces_stored_user() {
        let h = logged_in(ScriptedBackend::new()).await;
        let updated = User {
            email: "new@x.com".into(),
            ..alice()
        };
        let returned = updated.clone();
        h.mgr.backend().edit(move |s| s.updated_user = returned);

        let patch = UserPatch {
            email: Some("new@x.com".into()),
            ..UserPatch::default()
        };
        let user = h.mgr.update_profile(&patch).await.unwrap();

        assert_eq!(user, updated);
        assert_eq!(h.mgr.current_user().await, Some(updated));
        let stored = h.durable.get(USER_KEY).unwrap().unwrap();
        assert!(stored.contains("new@x.com"));
    }

    #[tokio::test]
    async fn test_update_profile_401_logs_out_and_clears_store() {
        let h = logged_in(ScriptedBackend::new()).await;
        h.mgr
            .backend()
            .edit(|s| s.authed_failure = Some(ApiError::Auth("expired".into())));

        let patch = UserPatch {
            email: Some("new@x.com".into()),
            ..UserPatch::default()
        };
        let err = h.mgr.update_profile(&patch).await.unwrap_err();

        assert!(matches!(err, SessionError::Api(ApiError::Auth(_))));
        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        assert_eq!(h.durable_token(), None);
        assert_eq!(h.durable.get(USER_KEY).unwrap(), None);
        assert_eq!(h.routes().last(), Some(&Route::Login));
    }

    #[tokio::test]
    async fn test_every_authenticated_operation_logs_out_on_401() {
        let me = UserId::new("u1");
        let other = UserId::new("u2");
        let msg = MessageId::new("m1");

        for op in 0..7 {
            let h = logged_in(ScriptedBackend::new()).await;
            h.mgr
                .backend()
                .edit(|s| s.authed_failure = Some(ApiError::Auth("expired".into())));

            let failed = match op {
                0 => h.mgr.fetch_user(&me).await.is_err(),
                1 => h.mgr.update_user(&other, &UserPatch::default()).await.is_err(),
                2 => h.mgr.delete_user(&other).await.is_err(),
                3 => h.mgr.list_messages(None).await.is_err(),
                4 => h.mgr.send_message("hi", None).await.is_err(),
                5 => h.mgr.delete_message(&msg).await.is_err(),
                _ => h.mgr.invite(&other).await.is_err(),
            };

            assert!(failed, "op {op} should fail");
            assert_eq!(h.mgr.state().await, AuthState::Anonymous, "op {op}");
            assert_eq!(h.durable_token(), None, "op {op}");
        }
    }

    #[tokio::test]
    async fn test_non_auth_errors_keep_session() {
        let h = logged_in(ScriptedBackend::new()).await;
        h.mgr
            .backend()
            .edit(|s| s.authed_failure = Some(ApiError::NotFound("user u9".into())));

        let err = h.mgr.fetch_user(&UserId::new("u9")).await.unwrap_err();

        assert!(matches!(err, SessionError::Api(ApiError::NotFound(_))));
        assert_eq!(h.mgr.state().await, AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_authenticated_operations_require_login() {
        let h = harness(ScriptedBackend::new());

        assert_eq!(
            h.mgr.list_messages(None).await.unwrap_err(),
            SessionError::NotAuthenticated
        );
        assert_eq!(
            h.mgr.update_profile(&UserPatch::default()).await.unwrap_err(),
            SessionError::NotAuthenticated
        );
        // Rejected before any network activity.
        assert_eq!(h.mgr.backend().authed_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.mgr.backend().csrf_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_401_does_not_tear_down_newer_session() {
        let h = logged_in(ScriptedBackend::new()).await;
        let stale = h.mgr.ticket().await.unwrap();

        // Log in again: new generation.
        h.mgr.logout().await;
        h.mgr.login("alice", "pw").await.unwrap();

        let result: Result<(), _> = h
            .mgr
            .settle(&stale, Err(ApiError::Auth("old token".into())))
            .await;

        assert!(result.is_err());
        assert_eq!(h.mgr.state().await, AuthState::Authenticated);
    }

    // =====================================================================
    // users
    // =====================================================================

    #[tokio::test]
    async fn test_update_user_for_self_updates_session() {
        let h = logged_in(ScriptedBackend::new()).await;
        let renamed = User {
            username: "alicia".into(),
            ..alice()
        };
        let returned = renamed.clone();
        h.mgr.backend().edit(move |s| s.updated_user = returned);

        let patch = UserPatch {
            username: Some("alicia".into()),
            ..UserPatch::default()
        };
        h.mgr.update_user(&UserId::new("u1"), &patch).await.unwrap();

        assert_eq!(h.mgr.current_user().await, Some(renamed));
    }

    #[tokio::test]
    async fn test_delete_self_logs_out() {
        let h = logged_in(ScriptedBackend::new()).await;

        h.mgr.delete_user(&UserId::new("u1")).await.unwrap();

        assert_eq!(h.mgr.state().await, AuthState::Anonymous);
        assert_eq!(h.routes().last(), Some(&Route::Login));
    }

    #[tokio::test]
    async fn test_delete_other_user_keeps_session() {
        let h = logged_in(ScriptedBackend::new()).await;

        h.mgr.delete_user(&UserId::new("u2")).await.unwrap();

        assert_eq!(h.mgr.state().await, AuthState::Authenticated);
    }

    // =====================================================================
    // guard()
    // =====================================================================

    #[tokio::test]
    async fn test_guard_redirects_anonymous_from_protected_routes() {
        let h = harness(ScriptedBackend::new());
        assert_eq!(h.mgr.guard(Route::Chat).await, Route::Login);
        assert_eq!(h.mgr.guard(Route::UserManagement).await, Route::Login);
        assert_eq!(h.mgr.guard(Route::Register).await, Route::Register);
    }

    #[tokio::test]
    async fn test_guard_lets_authenticated_through() {
        let h = logged_in(ScriptedBackend::new()).await;
        assert_eq!(h.mgr.guard(Route::Chat).await, Route::Chat);
    }

    #[tokio::test]
    async fn test_guard_keeps_current_session_during_relogin() {
        let gate = Arc::new(Notify::new());
        // Stored permit: the first login goes straight through.
        gate.notify_one();
        let h = logged_in(ScriptedBackend::gated(Arc::clone(&gate))).await;
        let mut states = h.mgr.subscribe();

        let relogin = h.mgr.login("alice", "pw");
        let check = async {
            states
                .wait_for(|s| *s == AuthState::Authenticating)
                .await
                .unwrap();
            let route = h.mgr.guard(Route::Chat).await;
            gate.notify_one();
            route
        };
        let (result, route) = tokio::join!(relogin, check);

        assert!(result.is_ok());
        assert_eq!(route, Route::Chat);
    }
}
