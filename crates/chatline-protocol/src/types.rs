//! Core protocol types for Chatline's HTTP API.
//!
//! Every type here is a JSON body that is either sent to or received from
//! the backend. Field names on the wire are camelCase; a few legacy names
//! that older backend revisions still emit are accepted via `alias`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder avatar service used when a user has no avatar of their own.
/// The user ID is passed as the seed so the picture is stable per user.
const FALLBACK_AVATAR_BASE: &str = "https://i.pravatar.cc/158?u=";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A backend-assigned user identifier.
///
/// The backend treats IDs as opaque strings, so we do too. The newtype
/// keeps a `UserId` from being passed where a `MessageId` is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a `UserId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A backend-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A user record as returned by the backend.
///
/// The client only ever holds transient copies; the backend owns the
/// canonical record. `username` and `email` default to empty strings
/// because some endpoints return a trimmed-down user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "avatar", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl User {
    /// Returns the user's avatar, or a deterministic placeholder seeded by
    /// the user ID when none is set.
    pub fn avatar_or_fallback(&self) -> String {
        match self.avatar_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{FALLBACK_AVATAR_BASE}{}", self.id),
        }
    }

    /// Checks the invariants serde can't express.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` when the ID is blank.
    pub fn validate(&self) -> Result<(), crate::ProtocolError> {
        if self.id.as_str().trim().is_empty() {
            return Err(crate::ProtocolError::InvalidMessage(
                "user record is missing an id".into(),
            ));
        }
        Ok(())
    }
}

/// A partial user used for profile and user-management updates.
///
/// Only the fields that are `Some` are sent; the backend keeps the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserPatch {
    /// Returns `true` if the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.avatar_url.is_none()
    }
}

/// Body of the self-update endpoint (`PUT /user`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfUpdate {
    pub user_id: UserId,
    pub updated_data: UserPatch,
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Username/password pair sent to `POST /auth/token`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Manual impl so passwords never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/register`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("avatar_url", &self.avatar_url)
            .finish()
    }
}

/// Successful response of `POST /auth/token`: who logged in, and the bearer
/// token to use from now on.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthGrant {
    pub user: User,
    pub token: String,
}

impl fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGrant")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Response of `PATCH /csrf`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiForgeryGrant {
    pub csrf_token: String,
}

/// Structured error payload returned by the backend on 4xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "message")]
    pub error: String,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A chat message as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    #[serde(alias = "content")]
    pub text: String,
    #[serde(alias = "userId")]
    pub author_user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl Message {
    /// Returns `true` if `user` wrote this message. Views use this to decide
    /// whether to offer a delete action.
    pub fn is_authored_by(&self, user: &User) -> bool {
        self.author_user_id == user.id
    }
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}
