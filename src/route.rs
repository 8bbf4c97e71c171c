//! Route metadata and the wire-level metadata envelope.
//!
//! A route is the (path, content-type, exchange-mode) triple identifying
//! one addressable operation. The same [`RouteMetadata`] value is used on
//! the server side (registration) and the client side (proxy calls), so
//! both ends agree on framing by construction.
//!
//! The [`Envelope`] is the small JSON header carried with an exchange's
//! first frame. It is always JSON, regardless of which converter encodes
//! the payload body.
//!
//! # Example
//!
//! ```
//! use routewire::route::{Envelope, ExchangeMode, RouteMetadata};
//!
//! let route = RouteMetadata::new("/users", "application/json", ExchangeMode::RequestOne);
//! let envelope = Envelope::for_route(&route);
//! let bytes = envelope.encode().unwrap();
//! let decoded = Envelope::decode(&bytes).unwrap();
//! assert_eq!(decoded.path(), "/users");
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutewireError};

/// Interaction pattern of an exchange.
///
/// Determines how many payload frames flow in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeMode {
    /// One frame in, none out. Fire-and-forget.
    OneWay,
    /// One frame in, exactly one out.
    RequestOne,
    /// One frame in, zero or more out.
    RequestMany,
    /// Many frames in (first carries the envelope), zero or more out.
    RequestStream,
}

/// Immutable descriptor of one addressable operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMetadata {
    path: String,
    content_type: String,
    mode: ExchangeMode,
}

impl RouteMetadata {
    /// Create a new route descriptor.
    pub fn new(
        path: impl Into<String>,
        content_type: impl Into<String>,
        mode: ExchangeMode,
    ) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
            mode,
        }
    }

    /// Routing key. Matched exactly, no prefix/hierarchy semantics.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Content type naming the payload converter for this route.
    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Declared exchange mode.
    #[inline]
    pub fn mode(&self) -> ExchangeMode {
        self.mode
    }

    /// Check structural validity. Registration rejects invalid metadata
    /// up front rather than failing at dispatch time.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(RoutewireError::InvalidRoute(
                "route path must not be empty".to_string(),
            ));
        }
        if self.content_type.is_empty() {
            return Err(RoutewireError::InvalidRoute(format!(
                "route {} declares an empty content type",
                self.path
            )));
        }
        Ok(())
    }
}

/// Metadata envelope carried alongside an exchange's payload.
///
/// A flat string map with two required keys, `PATH` and `MIME_TYPE`.
/// Additional keys are ignored by the core but survive a decode/encode
/// round-trip, so collaborators may reserve their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "PATH")]
    path: String,
    #[serde(rename = "MIME_TYPE")]
    mime_type: String,
    #[serde(flatten)]
    extra: BTreeMap<String, String>,
}

impl Envelope {
    /// Create an envelope with the given routing keys.
    pub fn new(path: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Build the envelope for a route. This depends only on the route,
    /// never on call arguments, so callers may build it once and reuse it.
    pub fn for_route(route: &RouteMetadata) -> Self {
        Self::new(route.path(), route.content_type())
    }

    /// Route path (the `PATH` key).
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Payload content type (the `MIME_TYPE` key).
    #[inline]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Look up an additional (non-required) envelope key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(|v| v.as_str())
    }

    /// Encode the envelope to its JSON wire form.
    pub fn encode(&self) -> Result<Bytes> {
        let raw = serde_json::to_vec(self)
            .map_err(|e| RoutewireError::Envelope(e.to_string()))?;
        Ok(Bytes::from(raw))
    }

    /// Decode an envelope from metadata bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RoutewireError::Envelope`] if the bytes are not valid
    /// JSON or either required key is missing.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| RoutewireError::Envelope(e.to_string()))
    }
}
