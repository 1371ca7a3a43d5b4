//! Actor identity extraction.
//!
//! Authentication is an external collaborator: requests arrive with the
//! acting user already established upstream and carried in the
//! `X-User-Id` header. This mirrors the trust model of the WebSocket
//! side, where a client announces its own id on connect.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user id for a request.
#[derive(Debug, Clone)]
pub struct Actor(pub String);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| Actor(value.to_string()))
            .ok_or_else(|| ApiError::validation("Missing X-User-Id header"))
    }
}
