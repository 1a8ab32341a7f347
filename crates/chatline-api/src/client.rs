//! `reqwest`-backed implementation of [`Backend`].

use chatline_protocol::{
    AntiForgeryGrant, AuthGrant, Codec, Credentials, ErrorBody, JsonCodec, Message, MessageId,
    NewMessage, Registration, SelfUpdate, User, UserId, UserPatch,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{ApiConfig, ApiError, AuthHeaders, Backend};

/// Header carrying the anti-forgery token on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// How a non-2xx status is translated into an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorPolicy {
    /// Unauthenticated calls (anti-forgery fetch, registration).
    Anonymous,
    /// `POST /auth/token`: every rejection is an auth failure.
    Login,
    /// Bearer-token calls: 401 means the session is gone.
    Authenticated,
}

/// HTTP client for the chat backend.
///
/// Cheap to clone: `reqwest::Client` is reference-counted internally.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    codec: JsonCodec,
}

impl ApiClient {
    /// Builds a client with the configured timeout and user agent.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the underlying HTTP client can't be
    /// constructed (e.g. no TLS backend).
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self {
            http,
            config,
            codec: JsonCodec,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, %url, "backend request");
        self.http.request(method, url)
    }

    fn authed(&self, method: Method, url: Url, auth: AuthHeaders<'_>) -> RequestBuilder {
        self.request(method, url)
            .bearer_auth(auth.token)
            .header(CSRF_HEADER, auth.csrf)
    }

    /// Sends `request` and decodes a JSON body of type `T` on success.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        policy: ErrorPolicy,
        resource: &str,
    ) -> Result<T, ApiError> {
        let (status, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(classify(status, &body, policy, resource));
        }
        self.codec.decode(&body).map_err(|e| {
            tracing::debug!(%status, resource, error = %e, "unexpected response body");
            ApiError::Server {
                status: Some(status.as_u16()),
                message: "unexpected response body".into(),
            }
        })
    }

    /// Sends `request`, ignoring any body on success.
    async fn send_empty(
        &self,
        request: RequestBuilder,
        policy: ErrorPolicy,
        resource: &str,
    ) -> Result<(), ApiError> {
        let (status, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(classify(status, &body, policy, resource));
        }
        Ok(())
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        tracing::debug!(%status, bytes = body.len(), "backend response");
        Ok((status, body.to_vec()))
    }
}

impl Backend for ApiClient {
    async fn fetch_anti_forgery_token(&self) -> Result<String, ApiError> {
        let url = self.config.endpoint(&["csrf"])?;
        let grant: AntiForgeryGrant = self
            .send(self.request(Method::PATCH, url), ErrorPolicy::Anonymous, "csrf")
            .await?;
        Ok(grant.csrf_token)
    }

    async fn register(&self, registration: &Registration, csrf: &str) -> Result<(), ApiError> {
        let url = self.config.endpoint(&["auth", "register"])?;
        let request = self
            .request(Method::POST, url)
            .header(CSRF_HEADER, csrf)
            .json(registration);
        self.send_empty(request, ErrorPolicy::Anonymous, "registration").await
    }

    async fn authenticate(&self, credentials: &Credentials, csrf: &str) -> Result<AuthGrant, ApiError> {
        let url = self.config.endpoint(&["auth", "token"])?;
        let request = self
            .request(Method::POST, url)
            .header(CSRF_HEADER, csrf)
            .json(credentials);
        self.send(request, ErrorPolicy::Login, "token").await
    }

    async fn fetch_user(&self, token: &str, id: &UserId) -> Result<User, ApiError> {
        let url = self.config.endpoint(&["users", id.as_str()])?;
        let request = self.request(Method::GET, url).bearer_auth(token);
        self.send(request, ErrorPolicy::Authenticated, &format!("user {id}"))
            .await
    }

    async fn update_user(
        &self,
        auth: AuthHeaders<'_>,
        id: &UserId,
        patch: &UserPatch,
    ) -> Result<User, ApiError> {
        let url = self.config.endpoint(&["users", id.as_str()])?;
        let request = self.authed(Method::PUT, url, auth).json(patch);
        self.send(request, ErrorPolicy::Authenticated, &format!("user {id}"))
            .await
    }

    async fn update_self(
        &self,
        auth: AuthHeaders<'_>,
        id: &UserId,
        patch: &UserPatch,
    ) -> Result<User, ApiError> {
        let url = self.config.endpoint(&["user"])?;
        let body = SelfUpdate {
            user_id: id.clone(),
            updated_data: patch.clone(),
        };
        let request = self.authed(Method::PUT, url, auth).json(&body);
        self.send(request, ErrorPolicy::Authenticated, &format!("user {id}"))
            .await
    }

    async fn delete_user(&self, auth: AuthHeaders<'_>, id: &UserId) -> Result<(), ApiError> {
        let url = self.config.endpoint(&["users", id.as_str()])?;
        let request = self.authed(Method::DELETE, url, auth);
        self.send_empty(request, ErrorPolicy::Authenticated, &format!("user {id}"))
            .await
    }

    async fn list_messages(
        &self,
        token: &str,
        conversation_id: Option<&str>,
    ) -> Result<Vec<Message>, ApiError> {
        let mut url = self.config.endpoint(&["messages"])?;
        if let Some(conversation) = conversation_id {
            url.query_pairs_mut().append_pair("conversationId", conversation);
        }
        let request = self.request(Method::GET, url).bearer_auth(token);
        self.send(request, ErrorPolicy::Authenticated, "messages").await
    }

    async fn send_message(&self, auth: AuthHeaders<'_>, message: &NewMessage) -> Result<Message, ApiError> {
        let url = self.config.endpoint(&["messages"])?;
        let request = self.authed(Method::POST, url, auth).json(message);
        self.send(request, ErrorPolicy::Authenticated, "messages").await
    }

    async fn delete_message(&self, auth: AuthHeaders<'_>, id: &MessageId) -> Result<(), ApiError> {
        let url = self.config.endpoint(&["messages", id.as_str()])?;
        let request = self.authed(Method::DELETE, url, auth);
        self.send_empty(request, ErrorPolicy::Authenticated, &format!("message {id}"))
            .await
    }

    async fn invite(&self, auth: AuthHeaders<'_>, user_id: &UserId) -> Result<(), ApiError> {
        let url = self.config.endpoint(&["invite", user_id.as_str()])?;
        let request = self.authed(Method::POST, url, auth);
        self.send_empty(request, ErrorPolicy::Authenticated, &format!("user {user_id}"))
            .await
    }
}

/// Maps a non-2xx response onto the error taxonomy.
///
/// ```text
/// Login          any status         → Auth
/// Authenticated  401                → Auth
/// any            404                → NotFound
/// any            4xx + {error}      → Validation
/// any            everything else    → Server
/// ```
fn classify(status: StatusCode, body: &[u8], policy: ErrorPolicy, resource: &str) -> ApiError {
    let server_message = JsonCodec
        .decode::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|m| !m.trim().is_empty());

    match policy {
        ErrorPolicy::Login => {
            return ApiError::Auth(
                server_message.unwrap_or_else(|| format!("login rejected ({status})")),
            );
        }
        ErrorPolicy::Authenticated if status == StatusCode::UNAUTHORIZED => {
            return ApiError::Auth(
                server_message.unwrap_or_else(|| "session is no longer valid".to_string()),
            );
        }
        _ => {}
    }

    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound(resource.to_string());
    }

    match server_message {
        Some(message) if status.is_client_error() => ApiError::Validation(message),
        message => ApiError::Server {
            status: Some(status.as_u16()),
            message: message.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            }),
        },
    }
}
