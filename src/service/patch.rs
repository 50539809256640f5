//! JSON-Patch (RFC 6902) application.
//!
//! Patches are applied to the full wire document of a property, so paths like
//! `/name` or a `test` on `/id` behave as clients expect. The result must still
//! be an object; changes to reserved keys are discarded.

use json_patch::Patch;
use serde_json::Value;

use crate::domain::{Property, PropertyFields};
use crate::error::{AppError, Result};

/// Parse a request body into a patch document.
///
/// # Errors
///
/// Returns [`AppError::PatchFailed`] if the body is not an array of valid operations.
pub fn parse_patch(body: Value) -> Result<Patch> {
    serde_json::from_value(body).map_err(|e| AppError::PatchFailed(e.to_string()))
}

/// Apply `patch` to `property` and return the resulting attribute set.
///
/// `property` is never modified; a failing operation leaves nothing applied.
///
/// # Errors
///
/// Returns [`AppError::PatchFailed`] if any operation fails or the patched
/// document is no longer an object.
pub fn apply_patch(property: &Property, patch: &Patch) -> Result<PropertyFields> {
    let mut document = property
        .to_document()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    json_patch::patch(&mut document, &patch.0).map_err(|e| AppError::PatchFailed(e.to_string()))?;

    PropertyFields::from_document(document)
        .map_err(|_| AppError::PatchFailed("patched document is not an object".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn property(value: Value) -> Property {
        Property::new(3, PropertyFields::from_document(value).unwrap(), Utc::now())
    }

    fn patch(value: Value) -> Patch {
        parse_patch(value).unwrap()
    }

    #[test]
    fn test_replace_single_field() {
        let original = property(json!({"name": "A", "rooms": 2}));

        let fields = apply_patch(
            &original,
            &patch(json!([{"op": "replace", "path": "/name", "value": "X"}])),
        )
        .unwrap();

        assert_eq!(fields.get("name"), Some(&json!("X")));
        assert_eq!(fields.get("rooms"), Some(&json!(2)));
        assert_eq!(fields.as_map().len(), 2);
    }

    #[test]
    fn test_sequence_applies_in_order() {
        let original = property(json!({"name": "A"}));

        let fields = apply_patch(
            &original,
            &patch(json!([
                {"op": "add", "path": "/tags", "value": []},
                {"op": "add", "path": "/tags/-", "value": "pool"},
                {"op": "copy", "from": "/name", "path": "/label"},
                {"op": "remove", "path": "/name"}
            ])),
        )
        .unwrap();

        assert_eq!(fields.get("tags"), Some(&json!(["pool"])));
        assert_eq!(fields.get("label"), Some(&json!("A")));
        assert!(fields.get("name").is_none());
    }

    #[test]
    fn test_failed_test_op_rejects_whole_patch() {
        let original = property(json!({"name": "A"}));

        let result = apply_patch(
            &original,
            &patch(json!([
                {"op": "replace", "path": "/name", "value": "X"},
                {"op": "test", "path": "/missing", "value": 1}
            ])),
        );

        assert!(matches!(result, Err(AppError::PatchFailed(_))));
        assert_eq!(original.fields.get("name"), Some(&json!("A")));
    }

    #[test]
    fn test_test_op_can_check_id() {
        let original = property(json!({"name": "A"}));

        let ok = apply_patch(&original, &patch(json!([{"op": "test", "path": "/id", "value": 3}])));
        assert!(ok.is_ok());

        let mismatch =
            apply_patch(&original, &patch(json!([{"op": "test", "path": "/id", "value": 4}])));
        assert!(mismatch.is_err());
    }

    #[test]
    fn test_reserved_keys_cannot_be_patched() {
        let original = property(json!({"name": "A"}));

        let fields = apply_patch(
            &original,
            &patch(json!([{"op": "replace", "path": "/id", "value": 99}])),
        )
        .unwrap();

        assert!(fields.get("id").is_none());
        assert_eq!(fields.get("name"), Some(&json!("A")));
    }

    #[test]
    fn test_replacing_root_with_scalar_fails() {
        let original = property(json!({"name": "A"}));

        let result = apply_patch(
            &original,
            &patch(json!([{"op": "replace", "path": "", "value": 5}])),
        );

        assert!(matches!(result, Err(AppError::PatchFailed(_))));
    }

    #[test]
    fn test_malformed_operations_rejected() {
        assert!(parse_patch(json!({"op": "replace"})).is_err());
        assert!(parse_patch(json!([{"op": "explode", "path": "/name"}])).is_err());
        assert!(parse_patch(json!([{"op": "move", "path": "/name"}])).is_err());
    }
}
