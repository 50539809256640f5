//! Property id path extractor.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::error::AppError;

/// The `{id}` path segment, parsed as a property id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyId(pub i64);

impl<S> FromRequestParts<S> for PropertyId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        raw.parse()
            .map(Self)
            .map_err(|_| AppError::BadRequest(format!("invalid property id: {raw}")))
    }
}
