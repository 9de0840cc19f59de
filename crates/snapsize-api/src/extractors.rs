//! Request extractors

use axum::{extract::FromRequestParts, http::request::Parts};
use snapsize_core::AppError;
use uuid::Uuid;

use crate::constants::ACCOUNT_ID_HEADER;
use crate::error::HttpAppError;

/// Calling account, as asserted by the upstream identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountId(pub Uuid);

impl<S> FromRequestParts<S> for AccountId
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACCOUNT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing account identity".to_string()))?;

        Uuid::parse_str(raw.trim())
            .map(AccountId)
            .map_err(|_| AppError::Unauthorized("Invalid account identity".to_string()).into())
    }
}
