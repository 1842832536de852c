use std::fmt::Display;
use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use diesel::{deserialize::FromSqlRow, expression::AsExpression};
use repository::MessageRepository;
use serde::{Deserialize, Serialize};
use service::MessageService;
use uuid::Uuid;

use crate::integration::db;
use crate::{conversation, state::AppState, user};

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn MessageRepository + Send + Sync>;
pub type Service = Arc<dyn MessageService + Send + Sync>;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route(
            "/conversations/{id}/messages",
            get(handler::api::find_page),
        )
        .route("/conversations/{id}/messages", post(handler::api::create))
        .route("/messages/unread", get(handler::api::unread_count))
        .with_state(s)
}

/// Time-ordered message identifier.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Serialize,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    FromSqlRow,
    AsExpression,
)]
#[diesel(sql_type = diesel::sql_types::Uuid)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
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

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message content is empty")]
    EmptyContent,
    #[error("invalid page: {0}")]
    InvalidPage(String),

    #[error(transparent)]
    _Conversation(#[from] conversation::Error),
    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}

impl From<&Error> for StatusCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::EmptyContent | Error::InvalidPage(_) => StatusCode::BAD_REQUEST,
            Error::_Conversation(e) => e.into(),
            Error::_User(e) => e.into(),
            Error::_R2d2(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::_Diesel(e) => db::status_of(e),
        }
    }
}
