use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::StatusCode;
use diesel::{deserialize::FromSqlRow, expression::AsExpression};
use repository::UserRepository;
use serde::{Deserialize, Serialize};
use service::UserService;
use uuid::Uuid;

use crate::integration::db;

pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn UserRepository + Send + Sync>;
pub type Service = Arc<dyn UserService + Send + Sync>;

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

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
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
    #[error("user not found: {0:?}")]
    NotFound(Id),

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}

impl From<&Error> for StatusCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::_R2d2(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::_Diesel(e) => db::status_of(e),
        }
    }
}
