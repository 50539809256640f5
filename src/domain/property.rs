//! Property record and attribute set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by the store. Client-supplied values for these are discarded.
pub const RESERVED_KEYS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// Attribute set of a property, never containing a reserved key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyFields(Map<String, Value>);

impl PropertyFields {
    /// Build an attribute set from a request body, dropping reserved keys.
    #[must_use]
    pub fn from_body(mut body: Map<String, Value>) -> Self {
        for key in RESERVED_KEYS {
            body.remove(key);
        }
        Self(body)
    }

    /// Build an attribute set from an arbitrary JSON document.
    ///
    /// Returns the document back if it is not an object.
    ///
    /// # Errors
    ///
    /// Fails when `value` is not a JSON object.
    pub fn from_document(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self::from_body(map)),
            other => Err(other),
        }
    }

    /// Look up a single attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A persisted property.
///
/// Serializes as a flat object: `{"id": .., <attributes>, "createdAt": .., "updatedAt": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Store-assigned identifier. Immutable.
    pub id: i64,

    /// User-defined attributes.
    #[serde(flatten)]
    pub fields: PropertyFields,

    /// Creation timestamp.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Create a fresh record.
    #[must_use]
    pub const fn new(id: i64, fields: PropertyFields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace all attributes in place, keeping `id` and `created_at`.
    pub fn replace_fields(&mut self, fields: PropertyFields, now: DateTime<Utc>) {
        self.fields = fields;
        self.updated_at = now;
    }

    /// Refresh `updated_at`.
    pub const fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// The full wire document of this record.
    ///
    /// # Errors
    ///
    /// Fails only if an attribute cannot be represented as JSON.
    pub fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> PropertyFields {
        PropertyFields::from_document(value).unwrap()
    }

    #[test]
    fn test_reserved_keys_are_stripped() {
        let fields = fields(json!({
            "id": 42,
            "name": "Lakeside",
            "createdAt": "2020-01-01T00:00:00Z",
            "updatedAt": "2020-01-01T00:00:00Z"
        }));

        assert_eq!(fields.as_map().len(), 1);
        assert!(fields.get("id").is_none());
        assert_eq!(fields.get("name"), Some(&json!("Lakeside")));
    }

    #[test]
    fn test_non_object_document_rejected() {
        let result = PropertyFields::from_document(json!([1, 2, 3]));
        assert_eq!(result.unwrap_err(), json!([1, 2, 3]));
    }

    #[test]
    fn test_wire_shape_is_flat() {
        let now = Utc::now();
        let property = Property::new(7, fields(json!({"name": "A", "rooms": 3})), now);

        let doc = property.to_document().unwrap();
        assert_eq!(doc["id"], json!(7));
        assert_eq!(doc["name"], json!("A"));
        assert_eq!(doc["rooms"], json!(3));
        assert!(doc.get("createdAt").is_some());
        assert!(doc.get("fields").is_none());

        let parsed: Property = serde_json::from_value(doc).unwrap();
        assert_eq!(parsed, property);
    }

    #[test]
    fn test_replace_fields_keeps_identity() {
        let created = Utc::now();
        let mut property = Property::new(1, fields(json!({"name": "A", "city": "Oslo"})), created);

        let later = created + chrono::Duration::seconds(5);
        property.replace_fields(fields(json!({"name": "B"})), later);

        assert_eq!(property.id, 1);
        assert_eq!(property.created_at, created);
        assert_eq!(property.updated_at, later);
        assert!(property.fields.get("city").is_none());
    }
}
