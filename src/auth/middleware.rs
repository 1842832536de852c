use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;

use crate::auth;

#[derive(Deserialize)]
struct TokenParams {
    token: String,
}

/// Resolves the caller from a bearer token, taken from the `Authorization`
/// header or, for browser WebSocket clients, the `token` query parameter.
pub async fn authorize(
    auth_service: State<auth::Service>,
    mut req: Request,
    next: Next,
) -> crate::Result<Response> {
    let token = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => bearer.token().to_string(),
        None => Query::<TokenParams>::try_from_uri(req.uri())
            .map(|Query(params)| params.token)
            .map_err(|_| super::Error::MissingToken)?,
    };

    let auth_user = auth_service.validate(&token).await?;
    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}
