//! Wire protocol for Chatline.
//!
//! This crate defines the "language" the client speaks with the chat
//! backend:
//!
//! - **Types** ([`User`], [`Message`], [`AuthGrant`], etc.): the JSON
//!   bodies that travel over HTTP.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values are
//!   converted to/from bytes, both for the wire and for local storage.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits below both the HTTP client and the local store.
//! It doesn't know about requests, tokens, or files; it only knows the
//! shape of the data.
//!
//! ```text
//! Store (bytes on disk) ─┐
//!                        ├─→ Protocol (User, Message, ...) → Session
//! API (HTTP bodies) ─────┘
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AntiForgeryGrant, AuthGrant, Credentials, ErrorBody, Message, MessageId,
    NewMessage, Registration, SelfUpdate, User, UserId, UserPatch,
};
