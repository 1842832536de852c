use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{debug, error};
use serde::Serialize;

use crate::{auth, conversation, event, integration, message, user};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _Auth(#[from] auth::Error),
    #[error(transparent)]
    _Conversation(#[from] conversation::Error),
    #[error(transparent)]
    _Event(#[from] event::Error),
    #[error(transparent)]
    _Integration(#[from] integration::Error),
    #[error(transparent)]
    _Message(#[from] message::Error),
    #[error(transparent)]
    _User(#[from] user::Error),

    #[error(transparent)]
    _Path(#[from] PathRejection),
    #[error(transparent)]
    _Query(#[from] QueryRejection),
    #[error(transparent)]
    _Json(#[from] JsonRejection),
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Self::_Auth(e) => e.into(),
            Self::_Conversation(e) => e.into(),
            Self::_Event(e) => e.into(),
            Self::_Integration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::_Message(e) => e.into(),
            Self::_User(e) => e.into(),
            Self::_Path(_) | Self::_Query(_) | Self::_Json(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn kind_of(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::BAD_REQUEST => "invalid_request",
        StatusCode::CONFLICT => "conflict",
        _ => "internal",
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            error!("{self:?}");
            "Internal server error".to_owned()
        } else {
            debug!("{self}");
            self.to_string()
        };

        let body = ErrorResponse {
            error: kind_of(status),
            message,
        };

        (status, Json(body)).into_response()
    }
}
