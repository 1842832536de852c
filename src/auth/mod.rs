use std::sync::Arc;

use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::user;

pub mod middleware;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn service::AuthService + Send + Sync>;

#[derive(Deserialize, Clone)]
struct TokenClaims {
    sub: Uuid,
}

/// The verified caller of a request or WebSocket connection.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    id: user::Id,
}

impl User {
    pub fn new(id: user::Id) -> Self {
        Self { id }
    }

    pub const fn id(&self) -> &user::Id {
        &self.id
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing bearer token")]
    MissingToken,
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] jsonwebtoken::errors::Error),
}

impl From<&Error> for StatusCode {
    fn from(_: &Error) -> Self {
        StatusCode::UNAUTHORIZED
    }
}
