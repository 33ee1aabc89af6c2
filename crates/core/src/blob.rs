use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::RecordId;

/// Prefix marking a reference to a blob stored in the document database.
pub const BLOB_SCHEME: &str = "firestore://";

/// Per-record ceiling of the document database, applied to decoded payloads.
pub const MAX_BLOB_BYTES: u64 = 1024 * 1024;

/// Decoded size of a base64 payload of `encoded_len` characters.
///
/// Computed as `ceil(encoded_len * 3 / 4)` without decoding. Padding is not
/// subtracted, so the estimate never undercounts.
///
/// # Examples
///
/// ```
/// use vellum_core::decoded_len;
///
/// assert_eq!(decoded_len(4), 3);
/// assert_eq!(decoded_len(5), 4);
/// assert_eq!(decoded_len(0), 0);
/// ```
#[must_use]
pub fn decoded_len(encoded_len: usize) -> u64 {
    (encoded_len as u64 * 3).div_ceil(4)
}

/// Opaque reference to a stored blob, rendered as `firestore://<record-id>`.
///
/// A reference is immutable once issued; changed content is stored as a new
/// record and gets a new reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobReference {
    id: RecordId,
}

impl BlobReference {
    /// Build a reference to the blob record with the given identifier.
    #[must_use]
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self { id: id.into() }
    }

    /// Parse a reference string.
    ///
    /// Returns `None` for strings without the [`BLOB_SCHEME`] prefix (external
    /// URLs) and for a prefix with an empty identifier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let id = value.strip_prefix(BLOB_SCHEME)?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(id))
    }

    /// Returns `true` if `value` uses the internal blob scheme.
    #[must_use]
    pub fn is_internal(value: &str) -> bool {
        value.starts_with(BLOB_SCHEME)
    }

    /// Identifier of the blob record this reference points to.
    #[must_use]
    pub fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl fmt::Display for BlobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{BLOB_SCHEME}{}", self.id)
    }
}

impl From<BlobReference> for String {
    fn from(reference: BlobReference) -> Self {
        reference.to_string()
    }
}

impl TryFrom<String> for BlobReference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a blob reference: {value}"))
    }
}

/// Stored form of a blob inside the document database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRecord {
    /// Logical path for bookkeeping; never used for addressing.
    #[serde(default)]
    pub path: String,
    /// Base64-encoded payload.
    pub content: String,
    /// MIME type of the decoded payload.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Absent on records written by other clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl BlobRecord {
    /// Render the record as a self-describing `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoded_len_rounds_up() {
        assert_eq!(decoded_len(1), 1);
        assert_eq!(decoded_len(2), 2);
        assert_eq!(decoded_len(3), 3);
        assert_eq!(decoded_len(8), 6);
        // 1 MiB of bytes encodes to 1_398_104 characters (with padding).
        assert!(decoded_len(1_398_104) >= MAX_BLOB_BYTES);
    }

    #[test]
    fn reference_round_trips_through_string() {
        let reference = BlobReference::new("abc123");
        let rendered = reference.to_string();
        assert_eq!(rendered, "firestore://abc123");
        assert_eq!(BlobReference::parse(&rendered), Some(reference));
    }

    #[test]
    fn parse_rejects_external_and_empty() {
        assert!(BlobReference::parse("https://cdn.example.com/a.png").is_none());
        assert!(BlobReference::parse("firestore://").is_none());
        assert!(BlobReference::is_internal("firestore://"));
        assert!(!BlobReference::is_internal("data:image/png;base64,AAAA"));
    }

    #[test]
    fn reference_serializes_as_string() {
        let reference = BlobReference::new("f1");
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, "\"firestore://f1\"");
        let back: BlobReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back.record_id().as_str(), "f1");
        assert!(serde_json::from_str::<BlobReference>("\"/logo.png\"").is_err());
    }

    #[test]
    fn blob_record_wire_names() {
        let record = BlobRecord {
            path: "events/poster.png".into(),
            content: "AAAA".into(),
            content_type: "image/png".into(),
            uploaded_at: Some(
                DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "image/png");
        assert_eq!(value["uploadedAt"], "2024-03-01T10:00:00Z");
        assert_eq!(record.to_data_uri(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn blob_record_needs_only_content_and_type() {
        let fields = serde_json::json!({"content": "aGVsbG8=", "type": "text/plain"});
        let record: BlobRecord = serde_json::from_value(fields).unwrap();
        assert!(record.path.is_empty());
        assert!(record.uploaded_at.is_none());
        assert_eq!(record.to_data_uri(), "data:text/plain;base64,aGVsbG8=");

        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("uploadedAt").is_none());
    }
}
