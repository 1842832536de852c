use std::fmt;
use std::sync::Arc;

use axum::{Router, http::StatusCode, routing::get};
use service::EventService;

use crate::{conversation, state::AppState, user};

mod context;
mod handler;
pub mod model;
pub mod service;

pub use model::Envelope;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn EventService + Send + Sync>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new().route("/ws", get(handler::ws)).with_state(s)
}

/// A broadcast room. User rooms carry notifications addressed to one identity,
/// conversation rooms carry everything happening inside one conversation.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Subject {
    User(user::Id),
    Conversation(conversation::Id),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User(id) => write!(f, "user room {id}"),
            Subject::Conversation(id) => write!(f, "conversation room {id}"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("identity mismatch: connection belongs to {verified}, got {claimed}")]
    IdentityMismatch {
        verified: user::Id,
        claimed: user::Id,
    },
    #[error("connection is closed")]
    Disconnected,

    #[error(transparent)]
    _Conversation(#[from] conversation::Error),
    #[error(transparent)]
    _NatsSubscribe(#[from] async_nats::SubscribeError),
}

impl From<&Error> for StatusCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::IdentityMismatch { .. } => StatusCode::FORBIDDEN,
            Error::Disconnected => StatusCode::GONE,
            Error::_Conversation(e) => e.into(),
            Error::_NatsSubscribe(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
