//! Payload converters - serialization/deserialization for payload bodies.
//!
//! A [`Converter`] is a codec bound to exactly one content-type string,
//! converting between raw bytes and a typed value. Two wire formats ship
//! with the core:
//!
//! - [`Converter::json`] - structured text via `serde_json`, the
//!   cross-language default (`application/json`)
//! - [`Converter::native`] - compact positional MessagePack via
//!   `rmp_serde::to_vec` (`application/x-rust-native`)
//!
//! The native format serializes structs as positional arrays, so decoding
//! depends on Rust field order. It is intended for same-runtime
//! client/server pairs only and is not a cross-language wire contract.
//!
//! # Example
//!
//! ```
//! use routewire::converter::Converter;
//!
//! let json = Converter::json();
//! let encoded = json.encode(&"hello").unwrap();
//! let decoded: String = json.decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod registry;

pub use registry::ConverterRegistry;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Content type owned by the default JSON converter.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type owned by the default native converter.
pub const NATIVE_CONTENT_TYPE: &str = "application/x-rust-native";

/// Wire format backing a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    /// Human-readable structured text (`serde_json`).
    Json,
    /// Positional MessagePack (`rmp_serde::to_vec`, not `to_vec_named`).
    Native,
}

/// A codec bound to exactly one content-type.
///
/// Converters are stateless with respect to any single exchange and cheap
/// to clone, so one instance can serve concurrent exchanges.
#[derive(Debug, Clone)]
pub struct Converter {
    content_type: String,
    format: WireFormat,
}

impl Converter {
    /// The default structured-text converter (`application/json`).
    pub fn json() -> Self {
        Self::json_as(JSON_CONTENT_TYPE)
    }

    /// A JSON-backed converter registered under a custom content type.
    pub fn json_as(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            format: WireFormat::Json,
        }
    }

    /// The default native converter (`application/x-rust-native`).
    ///
    /// Same-runtime pairs only; see the module docs.
    pub fn native() -> Self {
        Self::native_as(NATIVE_CONTENT_TYPE)
    }

    /// A native-format converter registered under a custom content type.
    pub fn native_as(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            format: WireFormat::Native,
        }
    }

    /// The single content type this converter owns.
    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Exact-equality content-type match. No hierarchy or wildcard
    /// semantics.
    #[inline]
    pub fn accept(&self, content_type: &str) -> bool {
        self.content_type == content_type
    }

    /// Encode a value to payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self.format {
            WireFormat::Json => Ok(serde_json::to_vec(value)?),
            // Positional to_vec: struct-as-array, field-order dependent.
            WireFormat::Native => Ok(rmp_serde::to_vec(value)?),
        }
    }

    /// Decode payload bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be deserialized to type T.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self.format {
            WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
            WireFormat::Native => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}
