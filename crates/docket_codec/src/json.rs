//! JSON encoding of documents, the record log payload format.

use crate::document::Document;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encodes a document as compact UTF-8 JSON.
///
/// # Errors
///
/// Returns `EncodingFailed` if serialization fails.
pub fn encode_document(doc: &Document) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(doc).map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Decodes a document from UTF-8 JSON bytes.
///
/// # Errors
///
/// Returns `DecodingFailed` for malformed JSON or invalid UTF-8, and
/// `NotADocument` when the top-level value is not an object.
pub fn decode_document(bytes: &[u8]) -> CodecResult<Document> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    Document::try_from(value)
}

/// Parses JSON text into a value.
///
/// # Errors
///
/// Returns `DecodingFailed` if the text is not valid JSON.
pub fn parse_value(text: &str) -> CodecResult<Value> {
    serde_json::from_str(text).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

impl Document {
    /// Renders the document as compact JSON text.
    ///
    /// # Errors
    ///
    /// Returns `EncodingFailed` if serialization fails.
    pub fn to_json(&self) -> CodecResult<String> {
        serde_json::to_string(self).map_err(|e| CodecError::encoding_failed(e.to_string()))
    }

    /// Renders the document as indented JSON text.
    ///
    /// # Errors
    ///
    /// Returns `EncodingFailed` if serialization fails.
    pub fn to_json_pretty(&self) -> CodecResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CodecError::encoding_failed(e.to_string()))
    }

    /// Parses a document from JSON text.
    ///
    /// # Errors
    ///
    /// See [`decode_document`].
    pub fn from_json(text: &str) -> CodecResult<Self> {
        decode_document(text.as_bytes())
    }
}
