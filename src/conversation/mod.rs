use std::fmt::Display;
use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use diesel::{deserialize::FromSqlRow, expression::AsExpression};
use repository::ConversationRepository;
use serde::{Deserialize, Serialize};
use service::ConversationService;
use uuid::Uuid;

use crate::integration::db;
use crate::{message, state::AppState, user};

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn ConversationRepository + Send + Sync>;
pub type Service = Arc<dyn ConversationService + Send + Sync>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/conversations", post(handler::api::get_or_create))
        .route("/conversations", get(handler::api::find_all))
        .with_state(s)
}

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, Hash, PartialEq, Eq, FromSqlRow, AsExpression,
)]
#[diesel(sql_type = diesel::sql_types::Uuid)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn get(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

db::impl_uuid_sql!(Id);

/// Opaque reference to an ad listing owned by the marketplace.
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, Hash, PartialEq, Eq, FromSqlRow, AsExpression,
)]
#[diesel(sql_type = diesel::sql_types::Uuid)]
#[serde(transparent)]
pub struct ListingId(Uuid);

impl ListingId {
    pub const fn get(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ListingId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

db::impl_uuid_sql!(ListingId);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("conversation not found: {0}")]
    NotFound(Id),
    #[error("participant is required")]
    MissingParticipant,
    #[error("cannot start a conversation with yourself")]
    SelfConversation,
    #[error("user {0} is not a participant of the conversation")]
    NotMember(user::Id),
    #[error("could not create conversation")]
    NotCreated,

    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _Message(Box<message::Error>),
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}

impl From<message::Error> for Error {
    fn from(e: message::Error) -> Self {
        Self::_Message(Box::new(e))
    }
}

impl From<&Error> for StatusCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MissingParticipant | Error::SelfConversation => StatusCode::BAD_REQUEST,
            Error::NotMember(_) => StatusCode::FORBIDDEN,
            Error::NotCreated | Error::_R2d2(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::_User(e) => e.into(),
            Error::_Message(e) => e.as_ref().into(),
            Error::_Diesel(e) => db::status_of(e),
        }
    }
}
