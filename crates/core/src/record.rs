use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Server-assigned identifier of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new instance from a string value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Return the inner string as a str slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::ops::Deref for RecordId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A document as the store sees it: identifier plus untyped fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: RecordId,
    pub fields: Fields,
}

impl Document {
    #[must_use]
    pub fn new(id: impl Into<RecordId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Look up a field by dotted path (`"location.type"`).
    #[must_use]
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Decode the fields into a typed record.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Serialization`] when the fields do not match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Record<T>, DataError> {
        let data = serde_json::from_value(serde_json::Value::Object(self.fields))?;
        Ok(Record { id: self.id, data })
    }
}

/// A persisted application entity.
///
/// Values that have not been written yet are plain `T` and carry no
/// identifier; once the store has assigned one it travels alongside the data
/// here and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: RecordId,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Record<T> {
    #[must_use]
    pub fn new(id: impl Into<RecordId>, data: T) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Serialize `value` into a field map.
///
/// An `id` key produced by the value is dropped: identifiers are assigned by
/// the store and are never part of the stored fields.
///
/// # Errors
///
/// Returns [`DataError::Serialization`] if `value` does not serialize to a
/// JSON object.
pub fn to_fields<T: Serialize + ?Sized>(value: &T) -> Result<Fields, DataError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(DataError::Serialization(format!(
            "expected an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        email: String,
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn record_id_newtype() {
        let id = RecordId::from("abc");
        assert_eq!(id.as_str(), "abc");
        assert_eq!(&*id, "abc");
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn decode_document_into_record() {
        let doc = Document::new(
            "p1",
            fields(json!({"name": "Ada", "email": "ada@example.com"})),
        );
        let record: Record<Person> = doc.decode().unwrap();
        assert_eq!(record.id.as_str(), "p1");
        assert_eq!(record.data.name, "Ada");
    }

    #[test]
    fn decode_mismatched_shape_fails() {
        let doc = Document::new("p1", fields(json!({"name": 5})));
        let err = doc.decode::<Person>().unwrap_err();
        assert!(matches!(err, DataError::Serialization(_)));
    }

    #[test]
    fn record_serializes_flat_with_id() {
        let record = Record::new(
            "p1",
            Person {
                name: "Ada".into(),
                email: "ada@example.com".into(),
            },
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], "p1");
        assert_eq!(value["name"], "Ada");
    }

    #[test]
    fn to_fields_strips_id() {
        let f = to_fields(&json!({"id": "x", "title": "Launch"})).unwrap();
        assert!(!f.contains_key("id"));
        assert_eq!(f["title"], "Launch");
    }

    #[test]
    fn to_fields_rejects_non_object() {
        let err = to_fields(&json!([1, 2])).unwrap_err();
        assert_eq!(
            err,
            DataError::Serialization("expected an object, got an array".into())
        );
    }

    #[test]
    fn field_lookup_follows_dotted_path() {
        let doc = Document::new(
            "e1",
            fields(json!({"location": {"type": "Virtual"}, "capacity": 40})),
        );
        assert_eq!(doc.field("location.type"), Some(&json!("Virtual")));
        assert_eq!(doc.field("capacity"), Some(&json!(40)));
        assert_eq!(doc.field("location.address"), None);
        assert_eq!(doc.field("capacity.inner"), None);
    }
}
