use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use vellum_core::{BlobRecord, BlobReference, DataError, decoded_len};

/// A payload ready for upload: base64 content tagged with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    content_type: String,
    encoded: String,
}

impl BlobContent {
    /// Wrap an already base64-encoded payload.
    pub fn from_base64(content_type: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            encoded: encoded.into(),
        }
    }

    /// Encode raw bytes.
    pub fn from_bytes(content_type: impl Into<String>, data: &[u8]) -> Self {
        Self::from_base64(content_type, STANDARD.encode(data))
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    ///
    /// Parameters between the MIME type and `;base64` (such as a charset) are
    /// dropped. A missing MIME type defaults to `application/octet-stream`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDataUri`] if the input is not a base64
    /// data URI.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_blob::BlobContent;
    ///
    /// let content = BlobContent::from_data_uri("data:image/png;base64,iVBORw0=").unwrap();
    /// assert_eq!(content.content_type(), "image/png");
    /// assert_eq!(content.encoded(), "iVBORw0=");
    /// ```
    pub fn from_data_uri(uri: &str) -> Result<Self, DataError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| DataError::InvalidDataUri("missing `data:` prefix".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| DataError::InvalidDataUri("missing `,` separator".into()))?;
        let header = header
            .strip_suffix(";base64")
            .ok_or_else(|| DataError::InvalidDataUri("payload is not base64-encoded".into()))?;
        let mime = header.split(';').next().unwrap_or_default().trim();
        let mime = if mime.is_empty() {
            "application/octet-stream"
        } else {
            mime
        };
        Ok(Self::from_base64(mime, payload))
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Decoded payload size, computed from the encoded length and rounded up.
    pub fn decoded_size(&self) -> u64 {
        decoded_len(self.encoded.len())
    }
}

/// A blob whose content has been fetched and decoded.
#[derive(Debug, Clone)]
pub struct ResolvedBlob {
    pub reference: BlobReference,
    pub record: BlobRecord,
    /// The decoded payload.
    pub data: Bytes,
}

impl ResolvedBlob {
    pub(crate) fn decode(reference: BlobReference, record: BlobRecord) -> Result<Self, DataError> {
        let data = STANDARD
            .decode(record.content.as_bytes())
            .map_err(|e| DataError::Serialization(format!("corrupt blob payload: {e}")))?;
        Ok(Self {
            reference,
            record,
            data: Bytes::from(data),
        })
    }

    pub fn content_type(&self) -> &str {
        &self.record.content_type
    }

    pub fn to_data_uri(&self) -> String {
        self.record.to_data_uri()
    }
}
