//! # Docket Codec
//!
//! The document value model for Docket and its two wire formats.
//!
//! - [`Value`] and [`Document`] hold schema-free JSON-compatible data.
//! - Record payloads are compact UTF-8 JSON ([`encode_document`],
//!   [`decode_document`]).
//! - Index snapshots are CBOR ([`to_cbor`], [`from_cbor`]).
//!
//! ## Usage
//!
//! ```
//! use docket_codec::{doc, decode_document, encode_document, Value};
//!
//! let product = doc! { "id" => "P1", "price" => 1200 };
//! let bytes = encode_document(&product).unwrap();
//!
//! let decoded = decode_document(&bytes).unwrap();
//! assert_eq!(decoded.get("price"), Some(&Value::Integer(1200)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod document;
mod error;
mod json;
mod value;

pub use cbor::{from_cbor, to_cbor};
pub use document::Document;
pub use error::{CodecError, CodecResult};
pub use json::{decode_document, encode_document, parse_value};
pub use value::Value;

/// Trait for types that can be encoded to record payload bytes.
pub trait Encode {
    /// Encode this value to bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from record payload bytes.
pub trait Decode: Sized {
    /// Decode this value from bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Document {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_document(self)
    }
}

impl Decode for Document {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_document(bytes)
    }
}
