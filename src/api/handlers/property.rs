//! Property resource handlers.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | /api/properties | [`index`] |
//! | POST | /api/properties | [`create`] |
//! | GET | /api/properties/{id} | [`show`] |
//! | PUT | /api/properties/{id} | [`upsert`] |
//! | PATCH | /api/properties/{id} | [`patch`] |
//! | DELETE | /api/properties/{id} | [`destroy`] |

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::api::extractors::{JsonBody, PropertyId};
use crate::api::handlers::respond::{handle_entity_not_found, respond_with_result};
use crate::api::state::AppState;
use crate::domain::PropertyFields;
use crate::error::Result;

/// List all properties.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn index(State(state): State<AppState>) -> Result<Response> {
    let properties = state.property_service.list().await?;
    Ok(respond_with_result(StatusCode::OK, properties))
}

/// Fetch one property.
///
/// # Errors
///
/// Returns a bodiless 404 if absent, or an error if storage fails.
pub async fn show(
    State(state): State<AppState>,
    PropertyId(id): PropertyId,
) -> Result<Response> {
    let property = handle_entity_not_found(id, state.property_service.find(id).await?)?;
    Ok(respond_with_result(StatusCode::OK, property))
}

/// Create a property from the request body.
///
/// # Errors
///
/// Returns an error if the body is not a JSON object or storage fails.
pub async fn create(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Response> {
    let property = state
        .property_service
        .create(PropertyFields::from_body(body))
        .await?;
    Ok(respond_with_result(StatusCode::CREATED, property))
}

/// Insert or replace the property at `id`. Any `id` in the body is ignored.
///
/// # Errors
///
/// Returns an error if the body is not a JSON object or storage fails.
pub async fn upsert(
    State(state): State<AppState>,
    PropertyId(id): PropertyId,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Response> {
    let property = state
        .property_service
        .upsert(id, PropertyFields::from_body(body))
        .await?;
    Ok(respond_with_result(StatusCode::OK, property))
}

/// Apply a JSON-Patch document to the property at `id`.
///
/// # Errors
///
/// Returns a bodiless 404 if absent, or a 500 if the patch or the save fails.
pub async fn patch(
    State(state): State<AppState>,
    PropertyId(id): PropertyId,
    JsonBody(operations): JsonBody<Value>,
) -> Result<Response> {
    let patched = state.property_service.patch(id, operations).await?;
    let property = handle_entity_not_found(id, patched)?;
    Ok(respond_with_result(StatusCode::OK, property))
}

/// Delete the property at `id`.
///
/// # Errors
///
/// Returns a bodiless 404 if absent, or an error if storage fails.
pub async fn destroy(
    State(state): State<AppState>,
    PropertyId(id): PropertyId,
) -> Result<Response> {
    let removed = state.property_service.destroy(id).await?;
    handle_entity_not_found(id, removed)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
