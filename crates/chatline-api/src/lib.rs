//! Remote API client for Chatline.
//!
//! Provides the [`Backend`] trait (every call the client makes to the chat
//! backend) and [`ApiClient`], its HTTP implementation built on `reqwest`.
//!
//! Each operation is exactly one HTTP request whose outcome is translated
//! into a typed result or an [`ApiError`]. Nothing here touches session
//! state; the session layer interprets results (e.g. tearing down on
//! [`ApiError::Auth`]).
//!
//! # Headers
//!
//! - `Authorization: Bearer <token>` on every authenticated call
//! - `X-CSRF-Token: <token>` on every mutating call (POST/PUT/DELETE)

#![allow(async_fn_in_trait)]

mod client;
mod config;
mod error;

pub use client::{ApiClient, CSRF_HEADER};
pub use config::ApiConfig;
pub use error::ApiError;

use std::future::Future;

use chatline_protocol::{
    AuthGrant, Credentials, Message, MessageId, NewMessage, Registration, User, UserId, UserPatch,
};

/// Credentials attached to an authenticated, mutating request.
#[derive(Clone, Copy)]
pub struct AuthHeaders<'a> {
    /// Bearer token from login.
    pub token: &'a str,
    /// Anti-forgery token from `PATCH /csrf`.
    pub csrf: &'a str,
}

impl std::fmt::Debug for AuthHeaders<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthHeaders { .. }")
    }
}

/// The chat backend, as seen by the client.
///
/// [`ApiClient`] talks HTTP; tests substitute a scripted implementation so
/// the session state machine can be exercised without a server.
///
/// The returned futures are `Send` so a backend can be driven from any
/// Tokio task.
pub trait Backend: Send + Sync + 'static {
    /// `PATCH /csrf`: issues a fresh anti-forgery token. No auth.
    fn fetch_anti_forgery_token(&self) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// `POST /auth/register`. A 4xx with an error payload is
    /// [`ApiError::Validation`].
    fn register(
        &self,
        registration: &Registration,
        csrf: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `POST /auth/token`. Any non-2xx is [`ApiError::Auth`].
    fn authenticate(
        &self,
        credentials: &Credentials,
        csrf: &str,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;

    /// `GET /users/{id}`.
    fn fetch_user(
        &self,
        token: &str,
        id: &UserId,
    ) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// `PUT /users/{id}` with the patch as body.
    fn update_user(
        &self,
        auth: AuthHeaders<'_>,
        id: &UserId,
        patch: &UserPatch,
    ) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// `PUT /user`: self-update, body `{userId, updatedData}`.
    fn update_self(
        &self,
        auth: AuthHeaders<'_>,
        id: &UserId,
        patch: &UserPatch,
    ) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// `DELETE /users/{id}`.
    fn delete_user(
        &self,
        auth: AuthHeaders<'_>,
        id: &UserId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `GET /messages`, optionally filtered by conversation.
    fn list_messages(
        &self,
        token: &str,
        conversation_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Message>, ApiError>> + Send;

    /// `POST /messages`.
    fn send_message(
        &self,
        auth: AuthHeaders<'_>,
        message: &NewMessage,
    ) -> impl Future<Output = Result<Message, ApiError>> + Send;

    /// `DELETE /messages/{id}`.
    fn delete_message(
        &self,
        auth: AuthHeaders<'_>,
        id: &MessageId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `POST /invite/{userId}`.
    fn invite(
        &self,
        auth: AuthHeaders<'_>,
        user_id: &UserId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
