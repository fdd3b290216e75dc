//! Caller identity extraction.
//!
//! Every user-facing route requires the `x-vestige-user` header carrying the
//! caller's UUID. Authentication proper lives upstream (a gateway terminates
//! it and injects this header); the API treats the header as the identity
//! boundary and scopes every query by it.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated user's id.
pub const USER_HEADER: &str = "x-vestige-user";

/// Extractor for the calling user's id.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", USER_HEADER)))?;

        let user_id = Uuid::parse_str(value)
            .map_err(|_| ApiError::Unauthorized(format!("invalid {} header", USER_HEADER)))?;

        Ok(UserId(user_id))
    }
}
