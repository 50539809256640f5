//! Response shaping shared by the property handlers.
//!
//! Errors are shaped by [`crate::error::AppError`]'s `IntoResponse` impl, or
//! at an explicit status with [`crate::error::AppError::into_response_with`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::Property;
use crate::error::{AppError, Result};

/// Write `status` with `result` serialized as the JSON body.
pub fn respond_with_result<T: Serialize>(status: StatusCode, result: T) -> Response {
    (status, Json(result)).into_response()
}

/// Pass a fetched entity through, or stop with a bodiless 404.
///
/// # Errors
///
/// Returns [`AppError::EntityNotFound`] when `entity` is `None`.
pub fn handle_entity_not_found(id: i64, entity: Option<Property>) -> Result<Property> {
    entity.ok_or(AppError::EntityNotFound(id))
}
